//! Scene graph container: owns the node arena and the component maps, keeps
//! parent/child links in sync, and runs the per-frame transform pass that
//! feeds render-instruction assembly.

use glam::Mat4;
use slotmap::SlotMap;

use crate::common::BufferIndex;
use crate::render::{Renderer, RendererKey};
use crate::scene::camera::Camera;
use crate::scene::layer::{Layer, Renderable};
use crate::scene::node::{DrawMode, Node, NodeDirtyFlags};
use crate::scene::{CameraKey, LayerKey, NodeKey};

/// The retained scene graph processed by the update thread.
///
/// The graph is a pure data layer: it stores hierarchy, components and
/// double-buffered properties. Frame sequencing lives in
/// [`UpdateManager`](crate::update::UpdateManager).
pub struct SceneGraph {
    pub(crate) nodes: SlotMap<NodeKey, Node>,
    pub(crate) cameras: SlotMap<CameraKey, Camera>,
    pub(crate) layers: SlotMap<LayerKey, Layer>,
    pub(crate) renderers: SlotMap<RendererKey, Renderer>,

    root: NodeKey,
    root_layer: LayerKey,

    /// Layers in tree-depth order, refreshed by the transform pass.
    pub(crate) sorted_layers: Vec<LayerKey>,

    /// Structure or sibling order changed; the depth tree must be rebuilt.
    pub(crate) depth_tree_dirty: bool,

    /// Any node changed this frame; drives the reset-properties phase.
    pub(crate) scene_dirty: bool,
}

impl SceneGraph {
    /// Creates a graph with a root node carrying the root layer.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let mut layers = SlotMap::with_key();

        let root = nodes.insert(Node::new());
        let root_layer = layers.insert(Layer::new(root));
        nodes[root].layer = Some(root_layer);

        Self {
            nodes,
            cameras: SlotMap::with_key(),
            layers,
            renderers: SlotMap::with_key(),
            root,
            root_layer,
            sorted_layers: Vec::new(),
            depth_tree_dirty: true,
            scene_dirty: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    #[inline]
    #[must_use]
    pub fn root_layer(&self) -> LayerKey {
        self.root_layer
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn get_node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn get_node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.scene_dirty = true;
        self.nodes.get_mut(key)
    }

    #[must_use]
    pub fn get_camera(&self, key: CameraKey) -> Option<&Camera> {
        self.cameras.get(key)
    }

    #[must_use]
    pub fn get_layer(&self, key: LayerKey) -> Option<&Layer> {
        self.layers.get(key)
    }

    #[must_use]
    pub fn get_renderer(&self, key: RendererKey) -> Option<&Renderer> {
        self.renderers.get(key)
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Inserts a node as a child of `parent`.
    pub fn add_node(&mut self, node: Node, parent: NodeKey) -> NodeKey {
        let key = self.nodes.insert(node);
        self.nodes[key].parent = Some(parent);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(key);
            p.dirty_flags |= NodeDirtyFlags::CHILD_ORDER;
        } else {
            log::error!("Parent node not found while adding a child");
        }
        self.depth_tree_dirty = true;
        self.scene_dirty = true;
        key
    }

    /// Re-parents `child` under `parent`, detaching it from its old parent.
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) {
        if child == parent {
            log::warn!("Cannot attach a node to itself");
            return;
        }
        let old_parent = self.nodes.get(child).and_then(|n| n.parent);
        if let Some(p) = old_parent
            && let Some(node) = self.nodes.get_mut(p)
            && let Some(i) = node.children.iter().position(|&k| k == child)
        {
            node.children.remove(i);
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
            p.dirty_flags |= NodeDirtyFlags::CHILD_ORDER;
        } else {
            log::error!("Parent node not found during attach");
            return;
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.dirty_flags |= NodeDirtyFlags::TRANSFORM;
        }
        self.depth_tree_dirty = true;
        self.scene_dirty = true;
    }

    /// Removes a node and its whole subtree, along with attached components.
    pub fn remove_node(&mut self, key: NodeKey) {
        if key == self.root {
            log::warn!("The root node cannot be removed");
            return;
        }
        let children = match self.nodes.get(key) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.remove_node(child);
        }

        if let Some(parent) = self.nodes.get(key).and_then(|n| n.parent)
            && let Some(p) = self.nodes.get_mut(parent)
            && let Some(i) = p.children.iter().position(|&k| k == key)
        {
            p.children.remove(i);
        }

        if let Some(node) = self.nodes.get(key) {
            if let Some(camera) = node.camera {
                self.cameras.remove(camera);
            }
            if let Some(layer) = node.layer {
                self.layers.remove(layer);
            }
            if let Some(renderer) = node.renderer {
                self.renderers.remove(renderer);
            }
        }

        self.nodes.remove(key);
        self.depth_tree_dirty = true;
        self.scene_dirty = true;
    }

    /// Sets a node's explicit order among its siblings.
    pub fn set_sibling_order(&mut self, key: NodeKey, order: u32) {
        if let Some(node) = self.nodes.get_mut(key)
            && node.sibling_order != order
        {
            node.sibling_order = order;
            let parent = node.parent;
            if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p)) {
                p.dirty_flags |= NodeDirtyFlags::CHILD_ORDER;
            }
            self.depth_tree_dirty = true;
            self.scene_dirty = true;
        }
    }

    // ========================================================================
    // Component attachment
    // ========================================================================

    pub fn attach_camera(&mut self, node: NodeKey, camera: Camera) -> CameraKey {
        let key = self.cameras.insert(camera);
        if let Some(n) = self.nodes.get_mut(node) {
            n.camera = Some(key);
        }
        key
    }

    pub fn attach_layer(&mut self, node: NodeKey, mut layer: Layer) -> LayerKey {
        layer.source_node = node;
        let key = self.layers.insert(layer);
        if let Some(n) = self.nodes.get_mut(node) {
            n.layer = Some(key);
        }
        key
    }

    pub fn attach_renderer(&mut self, node: NodeKey, renderer: Renderer) -> RendererKey {
        let key = self.renderers.insert(renderer);
        if let Some(n) = self.nodes.get_mut(node) {
            n.renderer = Some(key);
        }
        self.scene_dirty = true;
        key
    }

    pub fn detach_renderer(&mut self, node: NodeKey) {
        if let Some(n) = self.nodes.get_mut(node)
            && let Some(renderer) = n.renderer.take()
        {
            self.renderers.remove(renderer);
        }
        self.scene_dirty = true;
    }

    // ========================================================================
    // Per-frame passes
    // ========================================================================

    /// Resets animatable properties toward their base values. Called at the
    /// start of a frame that follows a change.
    pub(crate) fn reset_properties(&mut self, buffer: BufferIndex) {
        for node in self.nodes.values_mut() {
            node.reset_properties(buffer);
        }
    }

    /// True when `node` is `ancestor` or lies in its subtree.
    #[must_use]
    pub fn is_descendant_or_self(&self, node: NodeKey, ancestor: NodeKey) -> bool {
        let mut current = Some(node);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.nodes.get(key).and_then(|n| n.parent);
        }
        false
    }

    /// Applies freshly flattened depth indices.
    pub(crate) fn set_depth_indices(&mut self, depths: &[(NodeKey, i32)]) {
        for &(key, depth) in depths {
            if let Some(node) = self.nodes.get_mut(key) {
                node.depth_index = depth;
            }
        }
    }

    /// Computes world matrices for the whole tree and collects visible
    /// renderables into their nearest ancestor layer.
    ///
    /// Uses an explicit stack so deep hierarchies cannot overflow, and
    /// refreshes `sorted_layers` in tree-depth order as a side effect.
    pub(crate) fn update_world(&mut self, buffer: BufferIndex) {
        for layer in self.layers.values_mut() {
            layer.clear_renderables();
        }
        self.sorted_layers.clear();

        let mut stack: Vec<(NodeKey, Mat4, LayerKey)> = Vec::with_capacity(64);
        stack.push((self.root, Mat4::IDENTITY, self.root_layer));

        while let Some((key, parent_world, inherited_layer)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };
            if !node.visible.get(buffer) {
                continue;
            }

            let world = parent_world * Mat4::from_translation(node.position.get(buffer));
            node.world_matrix.set(buffer, world);
            node.dirty_flags = NodeDirtyFlags::empty();

            let is_layer_root = node.layer.is_some();
            let layer = node.layer.unwrap_or(inherited_layer);
            let renderer = node.renderer;
            let draw_mode = node.draw_mode;
            let camera = node.camera;
            let children_count = node.children.len();

            if is_layer_root {
                self.sorted_layers.push(layer);
            }
            if let Some(camera_key) = camera
                && let Some(cam) = self.cameras.get_mut(camera_key)
            {
                cam.update_view(buffer, world);
            }
            if let Some(renderer_key) = renderer
                && let Some(l) = self.layers.get_mut(layer)
            {
                let renderable = Renderable {
                    node: key,
                    renderer: renderer_key,
                };
                match draw_mode {
                    DrawMode::Normal => l.color_renderables.push(renderable),
                    DrawMode::Overlay => l.overlay_renderables.push(renderable),
                }
            }

            // Reverse push keeps sibling processing in insertion order.
            for i in (0..children_count).rev() {
                if let Some(node) = self.nodes.get(key)
                    && let Some(&child) = node.children.get(i)
                {
                    stack.push((child, world, layer));
                }
            }
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
