//! Command interpreter.
//!
//! [`CommandService`] owns the layout store and the compositor backend and
//! executes one envelope at a time. Commands apply partially: entries are
//! processed in order, an error aborts the rest of the envelope, and
//! nothing already applied is rolled back. Unknown screen or layer ids in
//! the add/modify/remove paths are skipped silently so a document written
//! for several hosts can be replayed everywhere.
//!
//! Add commands double as updates: when the id already exists the entry is
//! merged field-by-field (modify rules) and the insert directive is
//! re-applied, which makes a redundant add the way to restack or move an
//! element.

use thiserror::Error;
use tracing::{debug, info};

use ivi_wm_core::protocol::envelope::{
    decode_item, CommandEnvelope, LayerEntry, ProtocolError, ScreenEntry, SurfaceEntry,
};
use ivi_wm_core::{InsertPolicy, LayerId, LayerNode, LayoutStore, ScreenId, SurfaceId};

use crate::infrastructure::compositor::{Compositor, CompositorError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("envelope carries no command field")]
    NoCommand,

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("screen {0} unknown to the compositor")]
    UnknownScreen(ScreenId),

    #[error("surface {0} has no property record")]
    UnknownSurface(SurfaceId),

    #[error(transparent)]
    Compositor(#[from] CompositorError),
}

impl DispatchError {
    /// Status code written back to the client. 0 is success; each failure
    /// class gets its own negative code.
    pub fn status(&self) -> i32 {
        match self {
            DispatchError::NoCommand => -1,
            DispatchError::UnknownCommand(_) => -2,
            DispatchError::Protocol(_) => -3,
            DispatchError::UnknownScreen(_) => -4,
            DispatchError::UnknownSurface(_) => -5,
            DispatchError::Compositor(_) => -6,
        }
    }
}

pub(crate) fn require_id(id: Option<u32>) -> Result<u32, DispatchError> {
    id.ok_or(DispatchError::Protocol(ProtocolError::MissingField("id")))
}

/// Executes envelopes against the layout store and relays accepted changes
/// to the compositor.
pub struct CommandService<C> {
    pub(crate) store: LayoutStore,
    pub(crate) compositor: C,
    pub(crate) local_host: String,
}

impl<C: Compositor> CommandService<C> {
    /// `local_host` is matched against `target[].hostname` during bulk
    /// loads; passing it in keeps hostname lookup out of this layer.
    pub fn new(compositor: C, local_host: impl Into<String>) -> Self {
        Self {
            store: LayoutStore::new(),
            compositor,
            local_host: local_host.into(),
        }
    }

    pub fn store(&self) -> &LayoutStore {
        &self.store
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }

    /// Runs one envelope. On error, entries processed before the failure
    /// stay applied.
    pub fn execute(&mut self, envelope: &CommandEnvelope) -> Result<(), DispatchError> {
        let command = envelope.command.as_deref().ok_or(DispatchError::NoCommand)?;
        info!(command, "dispatching command");

        match command {
            "add_layer" => self.add_layer(envelope),
            "remove_layer" => self.remove_layer(envelope),
            "modify_layer" => self.modify_layer(envelope),
            "add_surface" => self.add_surface(envelope),
            "remove_surface" => self.remove_surface(envelope),
            "modify_surface" => self.modify_surface(envelope),
            "initial_screen" => self.initial_screen(envelope),
            other => Err(DispatchError::UnknownCommand(other.to_string())),
        }
    }

    // ── Layer commands ────────────────────────────────────────────────────────

    fn add_layer(&mut self, envelope: &CommandEnvelope) -> Result<(), DispatchError> {
        for raw in &envelope.screens {
            let screen: ScreenEntry = decode_item(raw)?;
            let screen_id = require_id(screen.id)?;
            if self.store.screen(screen_id).is_none() {
                debug!(screen = screen_id, "add_layer: screen not managed, skipping");
                continue;
            }

            // The insert directive lives at the screen level and governs
            // every layer in this entry.
            let policy = screen.insert.policy();
            for raw_layer in &screen.layers {
                let entry: LayerEntry = decode_item(raw_layer)?;
                let layer_id = require_id(entry.id)?;
                self.add_or_update_layer(screen_id, &entry, layer_id, policy)?;
            }
            self.sync_screen(screen_id)?;
        }
        Ok(())
    }

    fn remove_layer(&mut self, envelope: &CommandEnvelope) -> Result<(), DispatchError> {
        for raw in &envelope.layers {
            let entry: LayerEntry = decode_item(raw)?;
            let layer_id = require_id(entry.id)?;
            if !self.store.remove_layer(layer_id) {
                debug!(layer = layer_id, "remove_layer: not in tree");
            }
            // Relayed regardless; the compositor may know layers the tree
            // never saw.
            self.compositor.remove_layer(layer_id)?;
        }
        Ok(())
    }

    fn modify_layer(&mut self, envelope: &CommandEnvelope) -> Result<(), DispatchError> {
        for raw in &envelope.layers {
            let entry: LayerEntry = decode_item(raw)?;
            let layer_id = require_id(entry.id)?;
            let Some(node) = self.store.find_layer_mut(layer_id) else {
                debug!(layer = layer_id, "modify_layer: not in tree, skipping");
                continue;
            };
            entry.merge_into(&mut node.props);
            let props = node.props;
            self.compositor.apply_layer(layer_id, &props)?;
        }
        Ok(())
    }

    // ── Surface commands ──────────────────────────────────────────────────────

    fn add_surface(&mut self, envelope: &CommandEnvelope) -> Result<(), DispatchError> {
        for raw in &envelope.screens {
            // The screen entry only contributes the insert directive here;
            // layers are resolved wherever they live.
            let screen: ScreenEntry = decode_item(raw)?;
            let policy = screen.insert.policy();

            for raw_layer in &screen.layers {
                let entry: LayerEntry = decode_item(raw_layer)?;
                let layer_id = require_id(entry.id)?;
                if self.store.find_layer(layer_id).is_none() {
                    debug!(layer = layer_id, "add_surface: layer not in tree, skipping");
                    continue;
                }

                for raw_surface in &entry.surfaces {
                    let surface: SurfaceEntry = decode_item(raw_surface)?;
                    let surface_id = require_id(surface.id)?;
                    self.add_or_update_surface(layer_id, &surface, surface_id, policy)?;
                }
                self.push_surface_order(layer_id)?;
            }
        }
        Ok(())
    }

    fn remove_surface(&mut self, envelope: &CommandEnvelope) -> Result<(), DispatchError> {
        for raw in &envelope.layers {
            let entry: LayerEntry = decode_item(raw)?;
            let layer_id = require_id(entry.id)?;
            if self.store.find_layer(layer_id).is_none() {
                debug!(layer = layer_id, "remove_surface: layer not in tree, skipping");
                continue;
            }

            for raw_surface in &entry.surfaces {
                let surface: SurfaceEntry = decode_item(raw_surface)?;
                let surface_id = require_id(surface.id)?;
                if !self.store.remove_surface(layer_id, surface_id) {
                    debug!(surface = surface_id, "remove_surface: not on layer");
                }
                self.compositor
                    .remove_surface_from_layer(layer_id, surface_id)?;
            }
        }
        Ok(())
    }

    fn modify_surface(&mut self, envelope: &CommandEnvelope) -> Result<(), DispatchError> {
        for raw in &envelope.surfaces {
            let entry: SurfaceEntry = decode_item(raw)?;
            let surface_id = require_id(entry.id)?;

            // A surface without a property record was never added anywhere;
            // unlike the layer paths this is a hard error.
            let props = self
                .store
                .registry_mut()
                .props_mut(surface_id)
                .ok_or(DispatchError::UnknownSurface(surface_id))?;
            entry.layout.merge_into(props);
            let props = *props;
            self.compositor.apply_surface(surface_id, &props)?;
        }
        Ok(())
    }

    fn initial_screen(&mut self, envelope: &CommandEnvelope) -> Result<(), DispatchError> {
        // Full reset, then the same path the startup document takes, minus
        // the host filter.
        self.store.clear();
        self.apply_screens(&envelope.screens)
    }

    // ── Shared add-or-update and sync helpers ─────────────────────────────────

    /// Creates the layer under `screen` (add rules, all fields mandatory),
    /// or updates it in place: existing layers are merged field-by-field
    /// and re-inserted per the policy, wherever they previously lived.
    pub(crate) fn add_or_update_layer(
        &mut self,
        screen: ScreenId,
        entry: &LayerEntry,
        id: LayerId,
        policy: InsertPolicy,
    ) -> Result<(), DispatchError> {
        match self.store.take_layer(id) {
            Some(mut node) => {
                entry.merge_into(&mut node.props);
                self.store.insert_layer(screen, node, policy);
            }
            None => {
                let props = entry.complete_props()?;
                self.store.insert_layer(screen, LayerNode::new(id, props), policy);
            }
        }
        Ok(())
    }

    /// Creates or updates one surface reference on `layer` and pushes the
    /// resulting properties to the compositor.
    pub(crate) fn add_or_update_surface(
        &mut self,
        layer: LayerId,
        entry: &SurfaceEntry,
        id: SurfaceId,
        policy: InsertPolicy,
    ) -> Result<(), DispatchError> {
        if self.store.surface_in_layer(layer, id) {
            if let Some(props) = self.store.registry_mut().props_mut(id) {
                entry.layout.merge_into(props);
            }
            self.store.reorder_surface(layer, id, policy);
        } else {
            let props = entry.layout.complete()?;
            self.store.add_surface(layer, id, props, policy);
        }

        if let Some(props) = self.store.registry().props(id).copied() {
            self.compositor.apply_surface(id, &props)?;
        }
        Ok(())
    }

    /// Pushes the full state of one screen: per layer its properties and
    /// surface order, then the screen's layer order.
    pub(crate) fn sync_screen(&mut self, screen: ScreenId) -> Result<(), DispatchError> {
        let layer_ids = self.store.layer_order(screen);
        for id in &layer_ids {
            let Some((_, node)) = self.store.find_layer(*id) else {
                continue;
            };
            let props = node.props;
            self.compositor.apply_layer(*id, &props)?;
            self.push_surface_order(*id)?;
        }
        self.compositor.apply_layer_order(screen, &layer_ids)?;
        Ok(())
    }

    /// Pushes one layer's surface order, dropping ids the compositor does
    /// not know yet; they are re-pushed when their creation notification
    /// arrives.
    pub(crate) fn push_surface_order(&mut self, layer: LayerId) -> Result<(), DispatchError> {
        let order: Vec<SurfaceId> = self
            .store
            .surface_order(layer)
            .into_iter()
            .filter(|s| self.compositor.surface_exists(*s))
            .collect();
        self.compositor.apply_surface_order(layer, &order)?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
