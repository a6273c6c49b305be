//! # ivi-wm-daemon
//!
//! The layout control daemon. Listens on a unix socket for framed JSON
//! commands, keeps the ordered Screen → Layer → Surface model from
//! `ivi-wm-core` in sync, and relays every accepted change to the
//! compositor boundary.
//!
//! The crate is split the usual way:
//! - [`application`]: command interpreter, bulk document loader, and the
//!   handlers that reconcile compositor notifications with the model.
//! - [`infrastructure`]: the compositor boundary trait with its headless
//!   backend, the unix-socket reactor, and TOML settings.

pub mod application;
pub mod infrastructure;
