//! Render-side data: pooled render items and lists, per-task render
//! instructions, the instruction processor that culls and sorts, and the
//! render manager that replays instructions through the graphics
//! controller.

pub mod instruction;
pub mod item;
pub mod manager;
pub mod processor;
pub mod renderer;

pub use instruction::{RenderInstruction, RenderInstructionContainer, RenderInstructionSet};
pub use item::{RenderItem, RenderList, RenderListFlags};
pub use manager::{RenderManager, RendererData, RendererUpdate};
pub use processor::RenderInstructionProcessor;
pub use renderer::{BlendMode, OpacityType, Renderer};

/// Backend handle to an offscreen render target, re-exported where tasks
/// and instructions need it.
pub use crate::graphics::RenderTargetId;

slotmap::new_key_type! {
    /// Generation-checked handle to a [`Renderer`].
    pub struct RendererKey;
}
