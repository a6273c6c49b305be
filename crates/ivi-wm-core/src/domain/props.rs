//! Layout property records for layers and surfaces.

/// Geometry and visual state shared by layers and surfaces: a source
/// rectangle (crop within the content buffer), a destination rectangle
/// (placement on the output), opacity, and visibility.
///
/// There are no meaningful defaults: a record always holds whatever the
/// last complete write left in it, and merge-updates overwrite individual
/// fields only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutProps {
    pub src_x: u32,
    pub src_y: u32,
    pub src_w: u32,
    pub src_h: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub dst_w: u32,
    pub dst_h: u32,
    pub opacity: f64,
    pub visible: bool,
}

/// Per-layer properties: the layer's pixel dimensions plus the common
/// layout record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayerProps {
    pub width: u32,
    pub height: u32,
    pub layout: LayoutProps,
}
