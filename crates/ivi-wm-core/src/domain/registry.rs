//! Reference-counted registry of shared surface property records.
//!
//! A surface's layout record is not stored in the tree: it is shared by
//! every layer list that currently contains the surface id. The registry
//! keys records by surface id and counts one reference per (layer, surface)
//! pairing. A record exists exactly while its count is positive; the last
//! release destroys it.

use std::collections::HashMap;

use crate::domain::props::LayoutProps;
use crate::domain::SurfaceId;

/// One shared property record together with its reference count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRecord {
    pub props: LayoutProps,
    pub refs: usize,
}

/// Map of surface id → shared record. Mutated only by the tree store's
/// surface add/remove paths; the command interpreter reads it for
/// `modify_surface` and notification reconciliation.
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    records: HashMap<SurfaceId, SurfaceRecord>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one more reference to `id`. The first acquisition creates
    /// the record with a count of 1; later acquisitions overwrite the stored
    /// props (last-write-wins) and increment the count.
    pub fn acquire(&mut self, id: SurfaceId, props: LayoutProps) {
        let record = self
            .records
            .entry(id)
            .or_insert(SurfaceRecord { props, refs: 0 });
        record.props = props;
        record.refs += 1;
    }

    /// Drops one reference to `id`, destroying the record when the count
    /// reaches zero. Releasing an unknown id is a no-op.
    pub fn release(&mut self, id: SurfaceId) {
        if let Some(record) = self.records.get_mut(&id) {
            record.refs -= 1;
            if record.refs == 0 {
                self.records.remove(&id);
            }
        }
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn props(&self, id: SurfaceId) -> Option<&LayoutProps> {
        self.records.get(&id).map(|r| &r.props)
    }

    pub fn props_mut(&mut self, id: SurfaceId) -> Option<&mut LayoutProps> {
        self.records.get_mut(&id).map(|r| &mut r.props)
    }

    /// Current reference count for `id`, 0 when absent.
    pub fn ref_count(&self, id: SurfaceId) -> usize {
        self.records.get(&id).map_or(0, |r| r.refs)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
