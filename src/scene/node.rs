//! Scene-graph node: the internal, double-buffered counterpart of a public
//! actor handle.
//!
//! # Design Principles
//!
//! - Only data that the per-frame passes touch lives here: hierarchy links,
//!   the animatable transform/appearance properties and the cached world
//!   matrix.
//! - Heavier components (camera, layer, renderer) are attached by key and
//!   stored in the [`SceneGraph`](crate::scene::SceneGraph) component maps.
//! - All animatable state is double-buffered; the update thread writes the
//!   frame's buffer and the stable buffer rides along with the frame
//!   submission to the render side.

use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};

use crate::common::{BufferIndex, DoubleBuffered};
use crate::render::RendererKey;
use crate::scene::{CameraKey, LayerKey, NodeKey};
use crate::update::AnimatableProperty;

bitflags! {
    /// Which aspects of a node changed since the previous frame.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct NodeDirtyFlags: u8 {
        const TRANSFORM  = 1 << 0;
        const COLOR      = 1 << 1;
        const VISIBILITY = 1 << 2;
        /// Children were added/removed or sibling orders changed.
        const CHILD_ORDER = 1 << 3;
    }
}

/// How a node's renderer participates in a layer's render lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// Drawn with the layer's color render items.
    #[default]
    Normal,
    /// Drawn after all color items of the layer, unsorted by depth.
    Overlay,
}

/// A node in the retained scene graph.
pub struct Node {
    // === Hierarchy ===
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,

    /// Explicit draw/hit-test order among siblings. Ties keep insertion
    /// order; the depth-tree builder merges equal values into one band.
    pub(crate) sibling_order: u32,

    // === Animatable properties (double-buffered) ===
    pub position: AnimatableProperty<Vec3>,
    pub size: AnimatableProperty<Vec3>,
    pub color: AnimatableProperty<Vec4>,
    pub visible: AnimatableProperty<bool>,

    // === Derived per-frame state ===
    /// World matrix computed by the transform pass each frame.
    pub(crate) world_matrix: DoubleBuffered<Mat4>,
    /// Whether the last instruction build culled this node.
    pub(crate) culled: DoubleBuffered<bool>,
    /// Flattened depth index assigned by the depth-tree builder.
    pub(crate) depth_index: i32,

    // === Attachments (by key) ===
    pub(crate) renderer: Option<RendererKey>,
    pub(crate) camera: Option<CameraKey>,
    pub(crate) layer: Option<LayerKey>,
    pub(crate) draw_mode: DrawMode,

    pub(crate) dirty_flags: NodeDirtyFlags,
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            sibling_order: 0,
            position: AnimatableProperty::new(Vec3::ZERO),
            size: AnimatableProperty::new(Vec3::ZERO),
            color: AnimatableProperty::new(Vec4::ONE),
            visible: AnimatableProperty::new(true),
            world_matrix: DoubleBuffered::new(Mat4::IDENTITY),
            culled: DoubleBuffered::new(false),
            depth_index: 0,
            renderer: None,
            camera: None,
            layer: None,
            draw_mode: DrawMode::Normal,
            dirty_flags: NodeDirtyFlags::all(),
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn sibling_order(&self) -> u32 {
        self.sibling_order
    }

    /// The flattened depth index assigned by the last depth-tree rebuild.
    #[inline]
    #[must_use]
    pub fn depth_index(&self) -> i32 {
        self.depth_index
    }

    #[inline]
    #[must_use]
    pub fn renderer(&self) -> Option<RendererKey> {
        self.renderer
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> Option<CameraKey> {
        self.camera
    }

    #[inline]
    #[must_use]
    pub fn layer(&self) -> Option<LayerKey> {
        self.layer
    }

    #[inline]
    #[must_use]
    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    /// World matrix for the given buffer.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self, buffer: BufferIndex) -> Mat4 {
        self.world_matrix.get(buffer)
    }

    /// Whether the instruction build for `buffer` culled this node.
    #[inline]
    #[must_use]
    pub fn was_culled(&self, buffer: BufferIndex) -> bool {
        self.culled.get(buffer)
    }

    /// World opacity for the given buffer. Color is not inherited; the
    /// node's own alpha decides render-queue placement.
    #[inline]
    #[must_use]
    pub fn opacity(&self, buffer: BufferIndex) -> f32 {
        self.color.get(buffer).w
    }

    /// Resets all animatable properties toward their base values. Called by
    /// the update manager at the start of a frame that follows a change.
    pub(crate) fn reset_properties(&mut self, buffer: BufferIndex) {
        self.position.reset_to_base(buffer);
        self.size.reset_to_base(buffer);
        self.color.reset_to_base(buffer);
        self.visible.reset_to_base(buffer);
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
