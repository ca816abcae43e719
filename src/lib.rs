#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod common;
pub mod errors;
pub mod graphics;
pub mod render;
pub mod scene;
pub mod update;

pub use common::{BufferIndex, SceneGraphBuffers};
pub use errors::{Result, StageError};
pub use graphics::{CommandPool, GraphicsController, PipelineCache, Swapchain, UboPool};
pub use render::{RenderInstruction, RenderItem, RenderList, Renderer};
pub use scene::{Camera, Layer, Node, NodeKey, SceneGraph};
pub use update::{
    AnimatableProperty, FrameSubmission, Message, MessageSender, RenderTask, RenderTaskList,
    UpdateManager,
};
