//! GPU resource layer: the graphics controller abstraction and the pooled,
//! deferred-destruction resource management built on top of it — pipeline
//! cache, UBO pool, command pool, discard queue and swapchain.
//!
//! Nothing in the update/render-list logic touches a concrete backend;
//! everything goes through [`GraphicsController`]. Backend state such as
//! formats and blend modes is mirrored with `wgpu` descriptor types.

pub mod command_pool;
pub mod controller;
pub mod discard;
pub mod null;
pub mod pipeline_cache;
pub mod swapchain;
pub mod ubo_pool;

pub use command_pool::{CommandBufferLevel, CommandPool};
pub use controller::{
    fx_hash_key, BufferDesc, BufferId, CommandBufferId, FenceId, GraphicsController,
    PipelineCreateInfo, PipelineHandle, RenderPassId, RenderTargetId, SemaphoreId, SwapchainError,
    SwapchainId,
};
pub use discard::{DiscardQueue, DiscardedResource};
pub use null::NullGraphicsController;
pub use pipeline_cache::PipelineCache;
pub use swapchain::{Swapchain, SwapchainState};
pub use ubo_pool::{UboAllocation, UboPool};
