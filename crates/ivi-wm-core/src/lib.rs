//! # ivi-wm-core
//!
//! Shared library for the IVI window-layout daemon: the ordered layout tree,
//! the reference-counted surface property registry, and the JSON command
//! protocol (envelope types plus the framing constants used on the unix
//! socket).
//!
//! This crate holds the pure model. It has no dependency on sockets, the
//! async runtime, or any display stack, so everything in it can be unit
//! tested without external setup. The daemon crate layers the compositor
//! boundary and the reactor on top.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `ivi_wm_core::LayoutStore` instead of `ivi_wm_core::domain::tree::LayoutStore`.
pub use domain::props::{LayerProps, LayoutProps};
pub use domain::registry::SurfaceRegistry;
pub use domain::tree::{InsertPolicy, InsertPos, LayerNode, LayoutStore, ScreenNode};
pub use domain::{LayerId, ScreenId, SurfaceId};
pub use protocol::envelope::{CommandEnvelope, LayerEntry, ScreenEntry, SurfaceEntry, TargetEntry};
pub use protocol::wire::{MAGIC, STATUS_OK};
