//! Domain model for the layout daemon.
//!
//! Pure business state with no infrastructure dependencies: the three-level
//! Screen → Layer → Surface tree with ordered-insertion semantics, and the
//! reference-counted registry of shared surface properties. Code here never
//! talks to a socket or a compositor; the daemon's application layer drives
//! these types and relays the results to the compositor boundary.

pub mod props;
pub mod registry;
pub mod tree;

/// Identifier of a display output, assigned by the compositor.
pub type ScreenId = u32;
/// Identifier of a compositing layer.
pub type LayerId = u32;
/// Identifier of a client surface.
pub type SurfaceId = u32;
