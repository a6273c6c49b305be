//! Bulk layout loader.
//!
//! A layout document is a full envelope whose `target` array pairs a
//! hostname with the screens to build on that host. The same document is
//! shipped to every machine in the cluster; each daemon applies only the
//! targets naming its own host and skips the rest without complaint.
//!
//! `initial_screen` reuses [`CommandService::apply_screens`] after a full
//! reset, minus the host filter.

use serde_json::Value;
use tracing::{debug, info, warn};

use ivi_wm_core::protocol::envelope::{
    decode_item, CommandEnvelope, LayerEntry, ScreenEntry, SurfaceEntry, TargetEntry,
};
use ivi_wm_core::InsertPolicy;

use crate::application::dispatch::{require_id, CommandService, DispatchError};
use crate::infrastructure::compositor::Compositor;

impl<C: Compositor> CommandService<C> {
    /// Applies a layout document: every target naming this host runs
    /// through [`apply_screens`](Self::apply_screens). Targets for other
    /// hosts, and targets without a hostname, are skipped.
    pub fn load_document(&mut self, text: &str) -> Result<(), DispatchError> {
        let envelope = CommandEnvelope::parse(text)?;
        for raw in &envelope.target {
            let target: TargetEntry = decode_item(raw)?;
            match target.hostname.as_deref() {
                Some(host) if host == self.local_host => {
                    info!(host, "applying layout target");
                }
                Some(host) => {
                    debug!(host, "layout target is for another host, skipping");
                    continue;
                }
                None => {
                    warn!("layout target has no hostname, skipping");
                    continue;
                }
            }
            self.apply_screens(&target.screens)?;
        }
        Ok(())
    }

    /// Fallback when no document is given (or none of its targets match):
    /// mirror the compositor's outputs as empty screen nodes so later
    /// commands have somewhere to land.
    pub fn populate_from_compositor(&mut self) {
        for id in self.compositor.screen_ids() {
            debug!(screen = id, "mirroring compositor output");
            self.store.ensure_screen(id);
        }
    }

    /// True when the store holds no screens at all.
    pub fn is_empty(&self) -> bool {
        self.store.screens().is_empty()
    }

    /// Builds the given screens in order: every screen must exist at the
    /// compositor (a hard error, the document names the wrong machine
    /// otherwise), layers and their nested surfaces follow add rules with
    /// plain append ordering, and each screen is synced once at the end.
    pub(crate) fn apply_screens(&mut self, screens: &[Value]) -> Result<(), DispatchError> {
        for raw in screens {
            let screen: ScreenEntry = decode_item(raw)?;
            let screen_id = require_id(screen.id)?;
            if !self.compositor.screen_exists(screen_id) {
                return Err(DispatchError::UnknownScreen(screen_id));
            }
            self.store.ensure_screen(screen_id);

            for raw_layer in &screen.layers {
                let entry: LayerEntry = decode_item(raw_layer)?;
                let layer_id = require_id(entry.id)?;
                self.add_or_update_layer(screen_id, &entry, layer_id, InsertPolicy::Append)?;

                for raw_surface in &entry.surfaces {
                    let surface: SurfaceEntry = decode_item(raw_surface)?;
                    let surface_id = require_id(surface.id)?;
                    self.add_or_update_surface(
                        layer_id,
                        &surface,
                        surface_id,
                        InsertPolicy::Append,
                    )?;
                }
            }
            self.sync_screen(screen_id)?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::compositor::HeadlessCompositor;
    use serde_json::json;

    fn document(targets: serde_json::Value) -> String {
        json!({"version": "1.0.0", "target": targets}).to_string()
    }

    fn screen_with_layer() -> serde_json::Value {
        json!({
            "id": 0,
            "layers": [{
                "id": 10, "width": 800, "height": 480,
                "src_x": 0, "src_y": 0, "src_w": 800, "src_h": 480,
                "dst_x": 0, "dst_y": 0, "dst_w": 800, "dst_h": 480,
                "opacity": 1.0, "visibility": true,
                "surfaces": [{
                    "id": 100,
                    "src_x": 0, "src_y": 0, "src_w": 400, "src_h": 240,
                    "dst_x": 0, "dst_y": 0, "dst_w": 400, "dst_h": 240,
                    "opacity": 1.0, "visibility": true
                }]
            }]
        })
    }

    #[test]
    fn test_load_applies_matching_target() {
        let mut svc = CommandService::new(HeadlessCompositor::new(vec![0]), "head-unit");
        let doc = document(json!([{"hostname": "head-unit", "screens": [screen_with_layer()]}]));

        svc.load_document(&doc).unwrap();

        assert_eq!(svc.store().layer_order(0), vec![10]);
        assert_eq!(svc.store().surface_order(10), vec![100]);
        assert_eq!(svc.store().registry().ref_count(100), 1);
    }

    #[test]
    fn test_load_skips_targets_for_other_hosts() {
        let mut svc = CommandService::new(HeadlessCompositor::new(vec![0]), "head-unit");
        let doc = document(json!([{"hostname": "cluster", "screens": [screen_with_layer()]}]));

        svc.load_document(&doc).unwrap();

        assert!(svc.is_empty());
        assert!(svc.compositor().calls().is_empty());
    }

    #[test]
    fn test_load_fails_when_screen_unknown_to_compositor() {
        let mut svc = CommandService::new(HeadlessCompositor::new(vec![5]), "head-unit");
        let doc = document(json!([{"hostname": "head-unit", "screens": [screen_with_layer()]}]));

        let err = svc.load_document(&doc).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownScreen(0)));
        assert_eq!(err.status(), -4);
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let mut svc = CommandService::new(HeadlessCompositor::new(vec![0]), "head-unit");
        assert!(matches!(
            svc.load_document("{ broken"),
            Err(DispatchError::Protocol(_))
        ));
    }

    #[test]
    fn test_populate_from_compositor_creates_empty_screens() {
        let mut svc = CommandService::new(HeadlessCompositor::new(vec![0, 1]), "head-unit");
        assert!(svc.is_empty());

        svc.populate_from_compositor();

        assert!(!svc.is_empty());
        assert!(svc.store().layer_order(0).is_empty());
        assert!(svc.store().layer_order(1).is_empty());
    }

    #[test]
    fn test_reload_same_document_does_not_duplicate() {
        let mut svc = CommandService::new(HeadlessCompositor::new(vec![0]), "head-unit");
        let doc = document(json!([{"hostname": "head-unit", "screens": [screen_with_layer()]}]));

        svc.load_document(&doc).unwrap();
        svc.load_document(&doc).unwrap();

        assert_eq!(svc.store().layer_order(0), vec![10]);
        assert_eq!(svc.store().surface_order(10), vec![100]);
        // Update path reorders in place, it never re-acquires.
        assert_eq!(svc.store().registry().ref_count(100), 1);
    }
}
