//! Infrastructure layer: the compositor boundary, the socket reactor, and
//! on-disk settings.

pub mod compositor;
pub mod config;
pub mod server;
