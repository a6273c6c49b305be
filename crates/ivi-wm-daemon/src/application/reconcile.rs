//! Notification reconciliation.
//!
//! The compositor creates and destroys surfaces on its own schedule; the
//! layout tree may reference a surface long before the client renders it.
//! These handlers replay the stored state when the display stack catches
//! up. No client is waiting on this path, so failures are logged and
//! dropped.

use tracing::{debug, warn};

use ivi_wm_core::SurfaceId;

use crate::application::dispatch::{CommandService, DispatchError};
use crate::infrastructure::compositor::{Compositor, CompositorEvent};

impl<C: Compositor> CommandService<C> {
    /// Entry point for the reactor's notification arm.
    pub fn handle_event(&mut self, event: CompositorEvent) {
        let result = match event {
            CompositorEvent::SurfaceCreated(id) => self.surface_created(id),
            CompositorEvent::SurfacePropertiesChanged(id) => self.surface_properties_changed(id),
        };
        if let Err(e) = result {
            warn!(error = %e, ?event, "notification reconciliation failed");
        }
    }

    /// A surface appeared. If the tree references it, subscribe to its
    /// property changes so the stored layout can be replayed onto it.
    fn surface_created(&mut self, id: SurfaceId) -> Result<(), DispatchError> {
        if !self.store.registry().contains(id) {
            debug!(surface = id, "created surface is not referenced, ignoring");
            return Ok(());
        }
        self.compositor.watch_surface(id)?;
        Ok(())
    }

    /// A referenced surface changed underneath us: re-apply the stored
    /// properties and re-push the order of every layer that stacks it.
    fn surface_properties_changed(&mut self, id: SurfaceId) -> Result<(), DispatchError> {
        let Some(props) = self.store.registry().props(id).copied() else {
            debug!(surface = id, "changed surface is not referenced, ignoring");
            return Ok(());
        };

        self.compositor.apply_surface(id, &props)?;
        for layer in self.store.layers_containing_surface(id) {
            self.push_surface_order(layer)?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::compositor::{BoundaryCall, HeadlessCompositor};
    use ivi_wm_core::{InsertPolicy, LayerNode, LayerProps, LayoutProps};

    fn service_with_surface() -> CommandService<HeadlessCompositor> {
        let mut svc = CommandService::new(HeadlessCompositor::new(vec![0]), "test-host");
        svc.store.ensure_screen(0);
        svc.store.insert_layer(
            0,
            LayerNode::new(10, LayerProps::default()),
            InsertPolicy::Append,
        );
        svc.store.add_surface(
            10,
            100,
            LayoutProps {
                opacity: 0.75,
                visible: true,
                ..Default::default()
            },
            InsertPolicy::Append,
        );
        svc
    }

    #[test]
    fn test_surface_created_watches_referenced_surface() {
        let mut svc = service_with_surface();
        svc.handle_event(CompositorEvent::SurfaceCreated(100));
        assert_eq!(svc.compositor().calls(), &[BoundaryCall::WatchSurface(100)]);
    }

    #[test]
    fn test_surface_created_ignores_unreferenced_surface() {
        let mut svc = service_with_surface();
        svc.handle_event(CompositorEvent::SurfaceCreated(999));
        assert!(svc.compositor().calls().is_empty());
    }

    #[test]
    fn test_properties_changed_replays_props_and_order() {
        let mut svc = service_with_surface();
        svc.handle_event(CompositorEvent::SurfacePropertiesChanged(100));

        let calls = svc.compositor_mut().take_calls();
        assert!(matches!(calls[0], BoundaryCall::ApplySurface(100, p) if p.opacity == 0.75));
        assert_eq!(calls[1], BoundaryCall::ApplySurfaceOrder(10, vec![100]));
    }

    #[test]
    fn test_properties_changed_replays_every_containing_layer() {
        let mut svc = service_with_surface();
        svc.store.insert_layer(
            0,
            LayerNode::new(11, LayerProps::default()),
            InsertPolicy::Append,
        );
        svc.store
            .add_surface(11, 100, LayoutProps::default(), InsertPolicy::Append);

        svc.handle_event(CompositorEvent::SurfacePropertiesChanged(100));

        let calls = svc.compositor_mut().take_calls();
        assert!(calls.contains(&BoundaryCall::ApplySurfaceOrder(10, vec![100])));
        assert!(calls.contains(&BoundaryCall::ApplySurfaceOrder(11, vec![100])));
    }

    #[test]
    fn test_properties_changed_for_unreferenced_surface_is_ignored() {
        let mut svc = service_with_surface();
        svc.handle_event(CompositorEvent::SurfacePropertiesChanged(999));
        assert!(svc.compositor().calls().is_empty());
    }
}
