//! Scene graph: nodes, layers, cameras and the depth-tree builder that
//! assigns every node its rendering/hit-test order.

pub mod camera;
pub mod depth_tree;
pub mod graph;
pub mod layer;
pub mod node;

pub use camera::Camera;
pub use depth_tree::{
    build_depth_tree, flatten_depth_tree, DepthNode, NodeDepths, SIBLING_ORDER_MULTIPLIER,
};
pub use graph::SceneGraph;
pub use layer::{ClippingBox, Layer, LayerBehavior, Renderable};
pub use node::{DrawMode, Node, NodeDirtyFlags};

slotmap::new_key_type! {
    /// Generation-checked handle to a [`Node`] in the scene graph.
    pub struct NodeKey;

    /// Generation-checked handle to a [`Camera`] component.
    pub struct CameraKey;

    /// Generation-checked handle to a [`Layer`] component.
    pub struct LayerKey;
}
