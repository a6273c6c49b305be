//! Ordered layout tree: Screen → Layer → Surface.
//!
//! Each level is an ordered sequence (render order) with unique sibling ids.
//! Layers can be looked up by id regardless of which screen currently holds
//! them; surfaces live inside exactly one layer list per occurrence, while
//! their property records are shared through the [`SurfaceRegistry`].
//!
//! Counts are small in practice (a handful of screens, tens of layers), so
//! lookups scan the ordered sequences instead of maintaining a secondary
//! index.

use crate::domain::props::{LayerProps, LayoutProps};
use crate::domain::registry::SurfaceRegistry;
use crate::domain::{LayerId, ScreenId, SurfaceId};

/// Placement rule for inserting a child into an ordered sibling sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertPolicy {
    #[default]
    Append,
    Prepend,
    Before(u32),
    After(u32),
}

/// Effective placement after resolving a policy against the current
/// siblings. `Before`/`After` with an unknown reference id degrade to
/// [`InsertPos::Tail`]; resolution is explicit so tests can assert the
/// degradation instead of inferring it from final ordering alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPos {
    Head,
    Tail,
    At(usize),
}

impl InsertPolicy {
    /// Resolves this policy against the sibling ids currently in the
    /// sequence.
    pub fn resolve(&self, siblings: &[u32]) -> InsertPos {
        match *self {
            InsertPolicy::Append => InsertPos::Tail,
            InsertPolicy::Prepend => InsertPos::Head,
            InsertPolicy::Before(ref_id) => match siblings.iter().position(|&s| s == ref_id) {
                Some(idx) => InsertPos::At(idx),
                None => InsertPos::Tail,
            },
            InsertPolicy::After(ref_id) => match siblings.iter().position(|&s| s == ref_id) {
                Some(idx) => InsertPos::At(idx + 1),
                None => InsertPos::Tail,
            },
        }
    }
}

fn insert_at<T>(seq: &mut Vec<T>, pos: InsertPos, value: T) {
    match pos {
        InsertPos::Head => seq.insert(0, value),
        InsertPos::Tail => seq.push(value),
        InsertPos::At(idx) => seq.insert(idx, value),
    }
}

/// A compositing layer: ordered surface stack plus its own layout record.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerNode {
    pub id: LayerId,
    pub props: LayerProps,
    pub surfaces: Vec<SurfaceId>,
}

impl LayerNode {
    pub fn new(id: LayerId, props: LayerProps) -> Self {
        Self {
            id,
            props,
            surfaces: Vec::new(),
        }
    }
}

/// A display output holding an ordered layer stack. Screens are owned by
/// the compositor; this store only mirrors them and never deletes one
/// except on a full reset.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenNode {
    pub id: ScreenId,
    pub layers: Vec<LayerNode>,
}

/// The layout tree together with the surface property registry. The
/// registry is owned here so that every surface add/remove path keeps the
/// reference counts balanced.
#[derive(Debug, Default)]
pub struct LayoutStore {
    screens: Vec<ScreenNode>,
    registry: SurfaceRegistry,
}

impl LayoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SurfaceRegistry {
        &mut self.registry
    }

    pub fn screens(&self) -> &[ScreenNode] {
        &self.screens
    }

    /// Destroys the whole tree and every shared property record.
    pub fn clear(&mut self) {
        self.screens.clear();
        self.registry.clear();
    }

    // ── Screens ───────────────────────────────────────────────────────────────

    /// Returns the screen node for `id`, creating an empty one at the tail
    /// if it is not known yet.
    pub fn ensure_screen(&mut self, id: ScreenId) -> &mut ScreenNode {
        let idx = match self.screens.iter().position(|s| s.id == id) {
            Some(idx) => idx,
            None => {
                self.screens.push(ScreenNode {
                    id,
                    layers: Vec::new(),
                });
                self.screens.len() - 1
            }
        };
        &mut self.screens[idx]
    }

    pub fn screen(&self, id: ScreenId) -> Option<&ScreenNode> {
        self.screens.iter().find(|s| s.id == id)
    }

    /// Ordered layer ids for one screen.
    pub fn layer_order(&self, screen: ScreenId) -> Vec<LayerId> {
        self.screen(screen)
            .map(|s| s.layers.iter().map(|l| l.id).collect())
            .unwrap_or_default()
    }

    // ── Layers ────────────────────────────────────────────────────────────────

    /// Finds a layer by id anywhere in the tree, returning the owning
    /// screen id as well.
    pub fn find_layer(&self, id: LayerId) -> Option<(ScreenId, &LayerNode)> {
        self.screens.iter().find_map(|s| {
            s.layers
                .iter()
                .find(|l| l.id == id)
                .map(|l| (s.id, l))
        })
    }

    pub fn find_layer_mut(&mut self, id: LayerId) -> Option<&mut LayerNode> {
        self.screens
            .iter_mut()
            .find_map(|s| s.layers.iter_mut().find(|l| l.id == id))
    }

    /// Pops a layer out of whichever screen holds it, leaving its surface
    /// list (and the registry references behind it) intact. Used by
    /// add-or-update to express a move as a redundant add.
    pub fn take_layer(&mut self, id: LayerId) -> Option<LayerNode> {
        for screen in &mut self.screens {
            if let Some(idx) = screen.layers.iter().position(|l| l.id == id) {
                return Some(screen.layers.remove(idx));
            }
        }
        None
    }

    /// Inserts a layer under `screen` per `policy`. The screen node must
    /// already exist; sibling uniqueness is the caller's contract (insert
    /// is always preceded by a `take_layer` of the same id).
    pub fn insert_layer(&mut self, screen: ScreenId, node: LayerNode, policy: InsertPolicy) {
        let order = self.layer_order(screen);
        let pos = policy.resolve(&order);
        if let Some(s) = self.screens.iter_mut().find(|s| s.id == screen) {
            insert_at(&mut s.layers, pos, node);
        }
    }

    /// Removes a layer from wherever it lives, releasing the registry
    /// record of every surface it contained. Returns `false` when the id is
    /// unknown.
    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        match self.take_layer(id) {
            Some(layer) => {
                for sid in layer.surfaces {
                    self.registry.release(sid);
                }
                true
            }
            None => false,
        }
    }

    // ── Surfaces ──────────────────────────────────────────────────────────────

    pub fn surface_in_layer(&self, layer: LayerId, surface: SurfaceId) -> bool {
        self.find_layer(layer)
            .is_some_and(|(_, l)| l.surfaces.contains(&surface))
    }

    /// Ordered surface ids for one layer.
    pub fn surface_order(&self, layer: LayerId) -> Vec<SurfaceId> {
        self.find_layer(layer)
            .map(|(_, l)| l.surfaces.clone())
            .unwrap_or_default()
    }

    /// Adds a new surface reference under `layer`, acquiring (or bumping)
    /// its shared property record. Returns `false` when the layer is
    /// unknown.
    pub fn add_surface(
        &mut self,
        layer: LayerId,
        surface: SurfaceId,
        props: LayoutProps,
        policy: InsertPolicy,
    ) -> bool {
        let Some(node) = self.find_layer_mut(layer) else {
            return false;
        };
        let pos = policy.resolve(&node.surfaces);
        insert_at(&mut node.surfaces, pos, surface);
        self.registry.acquire(surface, props);
        true
    }

    /// Re-applies an insert policy to a surface already present in `layer`
    /// (pop and reinsert). The registry count is untouched.
    pub fn reorder_surface(&mut self, layer: LayerId, surface: SurfaceId, policy: InsertPolicy) {
        if let Some(node) = self.find_layer_mut(layer) {
            if let Some(idx) = node.surfaces.iter().position(|&s| s == surface) {
                node.surfaces.remove(idx);
                let pos = policy.resolve(&node.surfaces);
                insert_at(&mut node.surfaces, pos, surface);
            }
        }
    }

    /// Removes one surface reference from `layer`, releasing its registry
    /// record. Returns `false` when the layer or the surface is absent.
    pub fn remove_surface(&mut self, layer: LayerId, surface: SurfaceId) -> bool {
        let Some(node) = self.find_layer_mut(layer) else {
            return false;
        };
        match node.surfaces.iter().position(|&s| s == surface) {
            Some(idx) => {
                node.surfaces.remove(idx);
                self.registry.release(surface);
                true
            }
            None => false,
        }
    }

    /// Ids of every layer whose surface list currently contains `surface`.
    pub fn layers_containing_surface(&self, surface: SurfaceId) -> Vec<LayerId> {
        self.screens
            .iter()
            .flat_map(|s| &s.layers)
            .filter(|l| l.surfaces.contains(&surface))
            .map(|l| l.id)
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn layer_props() -> LayerProps {
        LayerProps {
            width: 800,
            height: 480,
            layout: LayoutProps {
                src_w: 800,
                src_h: 480,
                dst_w: 800,
                dst_h: 480,
                opacity: 1.0,
                visible: true,
                ..Default::default()
            },
        }
    }

    fn store_with_screen() -> LayoutStore {
        let mut store = LayoutStore::new();
        store.ensure_screen(0);
        store
    }

    // ── InsertPolicy resolution ───────────────────────────────────────────────

    #[test]
    fn test_append_resolves_to_tail() {
        assert_eq!(InsertPolicy::Append.resolve(&[1, 2]), InsertPos::Tail);
    }

    #[test]
    fn test_prepend_resolves_to_head() {
        assert_eq!(InsertPolicy::Prepend.resolve(&[1, 2]), InsertPos::Head);
    }

    #[test]
    fn test_before_known_reference_resolves_to_its_index() {
        assert_eq!(InsertPolicy::Before(2).resolve(&[1, 2, 3]), InsertPos::At(1));
    }

    #[test]
    fn test_after_known_reference_resolves_past_its_index() {
        assert_eq!(InsertPolicy::After(2).resolve(&[1, 2, 3]), InsertPos::At(2));
    }

    #[test]
    fn test_before_unknown_reference_degrades_to_tail() {
        assert_eq!(InsertPolicy::Before(99).resolve(&[1, 2]), InsertPos::Tail);
    }

    #[test]
    fn test_after_unknown_reference_degrades_to_tail() {
        assert_eq!(InsertPolicy::After(99).resolve(&[1, 2]), InsertPos::Tail);
    }

    // ── Layer lifecycle ───────────────────────────────────────────────────────

    #[test]
    fn test_insert_layer_orders_siblings_per_policy() {
        let mut store = store_with_screen();
        store.insert_layer(0, LayerNode::new(10, layer_props()), InsertPolicy::Append);
        store.insert_layer(0, LayerNode::new(11, layer_props()), InsertPolicy::Prepend);
        store.insert_layer(0, LayerNode::new(12, layer_props()), InsertPolicy::Before(10));
        assert_eq!(store.layer_order(0), vec![11, 12, 10]);
    }

    #[test]
    fn test_take_layer_then_insert_expresses_a_move() {
        let mut store = store_with_screen();
        store.ensure_screen(1);
        store.insert_layer(0, LayerNode::new(10, layer_props()), InsertPolicy::Append);

        let node = store.take_layer(10).expect("layer present");
        store.insert_layer(1, node, InsertPolicy::Append);

        assert!(store.layer_order(0).is_empty());
        assert_eq!(store.layer_order(1), vec![10]);
        assert_eq!(store.find_layer(10).map(|(s, _)| s), Some(1));
    }

    #[test]
    fn test_remove_layer_releases_every_surface_record() {
        let mut store = store_with_screen();
        store.insert_layer(0, LayerNode::new(10, layer_props()), InsertPolicy::Append);
        store.add_surface(10, 100, LayoutProps::default(), InsertPolicy::Append);
        store.add_surface(10, 200, LayoutProps::default(), InsertPolicy::Append);

        assert!(store.remove_layer(10));

        assert!(store.find_layer(10).is_none());
        assert!(!store.registry().contains(100));
        assert!(!store.registry().contains(200));
    }

    #[test]
    fn test_remove_layer_unknown_id_returns_false() {
        let mut store = store_with_screen();
        assert!(!store.remove_layer(77));
    }

    #[test]
    fn test_repeated_add_remove_of_same_layer_id_never_duplicates() {
        let mut store = store_with_screen();
        for _ in 0..3 {
            // Add-or-update contract: take first, then insert.
            let node = store
                .take_layer(10)
                .unwrap_or_else(|| LayerNode::new(10, layer_props()));
            store.insert_layer(0, node, InsertPolicy::Append);
        }
        assert_eq!(store.layer_order(0), vec![10]);
        assert!(store.remove_layer(10));
        assert!(store.find_layer(10).is_none());
    }

    // ── Surface lifecycle ─────────────────────────────────────────────────────

    #[test]
    fn test_add_surface_acquires_registry_record() {
        let mut store = store_with_screen();
        store.insert_layer(0, LayerNode::new(10, layer_props()), InsertPolicy::Append);
        assert!(store.add_surface(10, 100, LayoutProps::default(), InsertPolicy::Append));
        assert_eq!(store.registry().ref_count(100), 1);
    }

    #[test]
    fn test_same_surface_on_two_layers_counts_two_references() {
        let mut store = store_with_screen();
        store.insert_layer(0, LayerNode::new(10, layer_props()), InsertPolicy::Append);
        store.insert_layer(0, LayerNode::new(11, layer_props()), InsertPolicy::Append);
        store.add_surface(10, 100, LayoutProps::default(), InsertPolicy::Append);
        store.add_surface(11, 100, LayoutProps::default(), InsertPolicy::Append);

        assert_eq!(store.registry().ref_count(100), 2);
        assert_eq!(store.layers_containing_surface(100), vec![10, 11]);

        store.remove_surface(10, 100);
        assert_eq!(store.registry().ref_count(100), 1);
        store.remove_surface(11, 100);
        assert!(!store.registry().contains(100));
    }

    #[test]
    fn test_add_surface_before_existing_sibling() {
        let mut store = store_with_screen();
        store.insert_layer(0, LayerNode::new(10, layer_props()), InsertPolicy::Append);
        store.add_surface(10, 100, LayoutProps::default(), InsertPolicy::Append);
        store.add_surface(10, 200, LayoutProps::default(), InsertPolicy::Before(100));
        assert_eq!(store.surface_order(10), vec![200, 100]);
    }

    #[test]
    fn test_add_surface_unknown_layer_returns_false() {
        let mut store = store_with_screen();
        assert!(!store.add_surface(99, 100, LayoutProps::default(), InsertPolicy::Append));
        assert!(!store.registry().contains(100));
    }

    #[test]
    fn test_reorder_surface_keeps_registry_count() {
        let mut store = store_with_screen();
        store.insert_layer(0, LayerNode::new(10, layer_props()), InsertPolicy::Append);
        store.add_surface(10, 100, LayoutProps::default(), InsertPolicy::Append);
        store.add_surface(10, 200, LayoutProps::default(), InsertPolicy::Append);

        store.reorder_surface(10, 200, InsertPolicy::Prepend);

        assert_eq!(store.surface_order(10), vec![200, 100]);
        assert_eq!(store.registry().ref_count(200), 1);
    }

    #[test]
    fn test_remove_surface_absent_from_layer_returns_false() {
        let mut store = store_with_screen();
        store.insert_layer(0, LayerNode::new(10, layer_props()), InsertPolicy::Append);
        assert!(!store.remove_surface(10, 100));
    }

    #[test]
    fn test_clear_destroys_tree_and_registry() {
        let mut store = store_with_screen();
        store.insert_layer(0, LayerNode::new(10, layer_props()), InsertPolicy::Append);
        store.add_surface(10, 100, LayoutProps::default(), InsertPolicy::Append);

        store.clear();

        assert!(store.screens().is_empty());
        assert!(!store.registry().contains(100));
    }
}
