//! Layers partition the scene into independently sorted slices of render
//! items and optionally clip their children to a pixel rectangle.

use crate::render::RendererKey;
use crate::scene::NodeKey;

/// Pixel-space clipping rectangle applied to a layer's render list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ClippingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ClippingBox {
    #[must_use]
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// How items inside a layer are ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LayerBehavior {
    /// 2D UI content: ordered purely by depth index.
    #[default]
    Ui,
    /// 3D content: opaque front-to-back groups, transparent back-to-front
    /// by camera-space z.
    Scene3d,
}

/// A node/renderer pair collected during scene traversal, ready for render
/// list assembly.
#[derive(Clone, Copy, Debug)]
pub struct Renderable {
    pub node: NodeKey,
    pub renderer: RendererKey,
}

/// Layer component attached to a node.
///
/// The per-frame renderable lists are cleared before every traversal and
/// refilled; their capacity is retained across frames.
pub struct Layer {
    pub behavior: LayerBehavior,
    pub is_clipping: bool,
    pub clipping_box: ClippingBox,

    /// Node this layer is attached to (the subtree root it collects from).
    pub(crate) source_node: NodeKey,

    pub(crate) color_renderables: Vec<Renderable>,
    pub(crate) overlay_renderables: Vec<Renderable>,
}

impl Layer {
    #[must_use]
    pub fn new(source_node: NodeKey) -> Self {
        Self {
            behavior: LayerBehavior::Ui,
            is_clipping: false,
            clipping_box: ClippingBox::default(),
            source_node,
            color_renderables: Vec::new(),
            overlay_renderables: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn source_node(&self) -> NodeKey {
        self.source_node
    }

    #[inline]
    #[must_use]
    pub fn color_renderables(&self) -> &[Renderable] {
        &self.color_renderables
    }

    #[inline]
    #[must_use]
    pub fn overlay_renderables(&self) -> &[Renderable] {
        &self.overlay_renderables
    }

    /// Empties the per-frame lists, keeping capacity.
    pub(crate) fn clear_renderables(&mut self) {
        self.color_renderables.clear();
        self.overlay_renderables.clear();
    }
}
