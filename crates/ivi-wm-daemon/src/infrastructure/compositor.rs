//! Compositor boundary.
//!
//! Everything the daemon needs from the display stack goes through the
//! [`Compositor`] trait: existence queries, property pushes, render-order
//! pushes, and surface-lifecycle watches. The application layer never sees
//! a concrete backend.
//!
//! Asynchronous events flow the other way over an unbounded channel handed
//! to the backend at construction; the reactor drains it in its select
//! loop.
//!
//! [`HeadlessCompositor`] is the backend shipped in-tree. It accepts every
//! call, records it, and logs it, which makes it both the stand-in used
//! when no real display stack is attached and the recording fake every
//! test asserts against.

use std::collections::HashSet;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use ivi_wm_core::{LayerId, LayerProps, LayoutProps, ScreenId, SurfaceId};

/// Notification pushed by the backend when the display stack changes
/// underneath the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorEvent {
    SurfaceCreated(SurfaceId),
    SurfacePropertiesChanged(SurfaceId),
}

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("compositor rejected {op} for id {id}")]
    Rejected { op: &'static str, id: u32 },

    #[error("compositor connection lost")]
    ConnectionLost,
}

/// Operations the daemon issues against the display stack.
///
/// Existence queries are infallible reads; mutating calls can be rejected.
/// `&mut self` on the mutating calls keeps recording backends trivial and
/// costs nothing here, the daemon is single-threaded.
pub trait Compositor {
    fn screen_exists(&self, id: ScreenId) -> bool;
    fn layer_exists(&self, id: LayerId) -> bool;
    fn surface_exists(&self, id: SurfaceId) -> bool;

    /// Ids of the outputs the compositor currently drives.
    fn screen_ids(&self) -> Vec<ScreenId>;

    fn apply_layer(&mut self, id: LayerId, props: &LayerProps) -> Result<(), CompositorError>;
    fn apply_layer_order(
        &mut self,
        screen: ScreenId,
        order: &[LayerId],
    ) -> Result<(), CompositorError>;
    fn remove_layer(&mut self, id: LayerId) -> Result<(), CompositorError>;

    fn apply_surface(&mut self, id: SurfaceId, props: &LayoutProps)
        -> Result<(), CompositorError>;
    fn apply_surface_order(
        &mut self,
        layer: LayerId,
        order: &[SurfaceId],
    ) -> Result<(), CompositorError>;
    fn remove_surface_from_layer(
        &mut self,
        layer: LayerId,
        surface: SurfaceId,
    ) -> Result<(), CompositorError>;

    /// Subscribes to lifecycle notifications for one surface.
    fn watch_surface(&mut self, id: SurfaceId) -> Result<(), CompositorError>;
}

// ── Headless backend ──────────────────────────────────────────────────────────

/// One recorded boundary call, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryCall {
    ApplyLayer(LayerId, LayerProps),
    ApplyLayerOrder(ScreenId, Vec<LayerId>),
    RemoveLayer(LayerId),
    ApplySurface(SurfaceId, LayoutProps),
    ApplySurfaceOrder(LayerId, Vec<SurfaceId>),
    RemoveSurfaceFromLayer(LayerId, SurfaceId),
    WatchSurface(SurfaceId),
}

/// Permissive recording backend.
///
/// Screens are the fixed set given at construction; layers and surfaces
/// are reported as existing unless explicitly marked missing. Mutating
/// calls succeed unless the id has been marked rejected.
pub struct HeadlessCompositor {
    screens: Vec<ScreenId>,
    missing_surfaces: HashSet<SurfaceId>,
    rejected_layers: HashSet<LayerId>,
    calls: Vec<BoundaryCall>,
    events: Option<UnboundedSender<CompositorEvent>>,
}

impl HeadlessCompositor {
    pub fn new(screens: Vec<ScreenId>) -> Self {
        Self {
            screens,
            missing_surfaces: HashSet::new(),
            rejected_layers: HashSet::new(),
            calls: Vec::new(),
            events: None,
        }
    }

    /// Same as [`new`](Self::new) but wired to push notifications into the
    /// reactor's channel.
    pub fn with_events(screens: Vec<ScreenId>, events: UnboundedSender<CompositorEvent>) -> Self {
        Self {
            events: Some(events),
            ..Self::new(screens)
        }
    }

    /// Makes `surface_exists(id)` report false from now on.
    pub fn mark_surface_missing(&mut self, id: SurfaceId) {
        self.missing_surfaces.insert(id);
    }

    pub fn mark_surface_present(&mut self, id: SurfaceId) {
        self.missing_surfaces.remove(&id);
    }

    /// Makes every mutating call for layer `id` fail with
    /// [`CompositorError::Rejected`].
    pub fn reject_layer(&mut self, id: LayerId) {
        self.rejected_layers.insert(id);
    }

    /// Simulates an asynchronous display-stack notification. Dropped
    /// silently when no channel is attached or the reactor is gone.
    pub fn emit(&self, event: CompositorEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    pub fn calls(&self) -> &[BoundaryCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BoundaryCall> {
        std::mem::take(&mut self.calls)
    }

    fn record(&mut self, call: BoundaryCall) {
        debug!(?call, "headless compositor");
        self.calls.push(call);
    }
}

impl Compositor for HeadlessCompositor {
    fn screen_exists(&self, id: ScreenId) -> bool {
        self.screens.contains(&id)
    }

    fn layer_exists(&self, _id: LayerId) -> bool {
        true
    }

    fn surface_exists(&self, id: SurfaceId) -> bool {
        !self.missing_surfaces.contains(&id)
    }

    fn screen_ids(&self) -> Vec<ScreenId> {
        self.screens.clone()
    }

    fn apply_layer(&mut self, id: LayerId, props: &LayerProps) -> Result<(), CompositorError> {
        if self.rejected_layers.contains(&id) {
            return Err(CompositorError::Rejected {
                op: "apply_layer",
                id,
            });
        }
        self.record(BoundaryCall::ApplyLayer(id, *props));
        Ok(())
    }

    fn apply_layer_order(
        &mut self,
        screen: ScreenId,
        order: &[LayerId],
    ) -> Result<(), CompositorError> {
        self.record(BoundaryCall::ApplyLayerOrder(screen, order.to_vec()));
        Ok(())
    }

    fn remove_layer(&mut self, id: LayerId) -> Result<(), CompositorError> {
        if self.rejected_layers.contains(&id) {
            return Err(CompositorError::Rejected {
                op: "remove_layer",
                id,
            });
        }
        self.record(BoundaryCall::RemoveLayer(id));
        Ok(())
    }

    fn apply_surface(
        &mut self,
        id: SurfaceId,
        props: &LayoutProps,
    ) -> Result<(), CompositorError> {
        self.record(BoundaryCall::ApplySurface(id, *props));
        Ok(())
    }

    fn apply_surface_order(
        &mut self,
        layer: LayerId,
        order: &[SurfaceId],
    ) -> Result<(), CompositorError> {
        self.record(BoundaryCall::ApplySurfaceOrder(layer, order.to_vec()));
        Ok(())
    }

    fn remove_surface_from_layer(
        &mut self,
        layer: LayerId,
        surface: SurfaceId,
    ) -> Result<(), CompositorError> {
        self.record(BoundaryCall::RemoveSurfaceFromLayer(layer, surface));
        Ok(())
    }

    fn watch_surface(&mut self, id: SurfaceId) -> Result<(), CompositorError> {
        self.record(BoundaryCall::WatchSurface(id));
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
