//! Graphics Controller abstraction.
//!
//! The single boundary between the core and a concrete GL/Vulkan backend.
//! Resources are addressed by plain id newtypes; creation, mapping,
//! recording, submission and presentation all go through this trait, which
//! keeps the pools and the render manager backend-agnostic and testable.
//!
//! Only the render thread calls into a controller; the pools built on top
//! carry no locks for that reason.

use std::hash::{Hash, Hasher};

use glam::Vec4;

use crate::scene::ClippingBox;

// ─── Resource ids ────────────────────────────────────────────────────────────

macro_rules! id_type {
    ($(#[$doc:meta] $name:ident),+ $(,)?) => {
        $(
            #[$doc]
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u32);

            impl $name {
                #[inline]
                #[must_use]
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )+
    };
}

id_type! {
    /// Backend buffer object.
    BufferId,
    /// Backend framebuffer / render target.
    RenderTargetId,
    /// Backend render pass object.
    RenderPassId,
    /// Cached pipeline state object.
    PipelineHandle,
    /// Backend command buffer.
    CommandBufferId,
    /// Backend fence.
    FenceId,
    /// Backend semaphore.
    SemaphoreId,
    /// Backend swapchain.
    SwapchainId,
}

/// Level of an allocated command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferLevel {
    Primary,
    Secondary,
}

// ─── Descriptors ─────────────────────────────────────────────────────────────

/// Buffer creation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: wgpu::BufferUsages,
    pub mappable: bool,
}

/// Full pipeline state, mirrored with `wgpu` descriptor types.
///
/// This is the canonical cache key: two create-infos comparing equal
/// describe the same pipeline. The hash used for cache lookups is computed
/// separately (see [`fx_hash_key`]) so collision handling stays explicit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineCreateInfo {
    pub label: &'static str,
    pub topology: wgpu::PrimitiveTopology,
    pub front_face: wgpu::FrontFace,
    pub cull_mode: Option<wgpu::Face>,
    pub blend_state: Option<wgpu::BlendState>,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub sample_count: u32,
}

impl Default for PipelineCreateInfo {
    fn default() -> Self {
        Self {
            label: "Scene Pipeline",
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            blend_state: Some(wgpu::BlendState::ALPHA_BLENDING),
            color_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            depth_format: Some(wgpu::TextureFormat::Depth24PlusStencil8),
            depth_write: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            sample_count: 1,
        }
    }
}

/// FxHash of any hashable key, used for pipeline cache lookups.
#[must_use]
pub fn fx_hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Non-success results from acquire/present. Any of these transitions the
/// owning [`Swapchain`](crate::graphics::Swapchain) to its invalid state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainError {
    OutOfDate,
    SurfaceLost,
    DeviceLost,
    Timeout,
}

// ─── Controller trait ────────────────────────────────────────────────────────

/// Backend interface the core depends on.
///
/// Environment-driven failures surface as explicit results the caller must
/// check; the controller never panics for device conditions.
pub trait GraphicsController {
    // ── Resource creation / destruction ──────────────────────────────────
    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferId;
    fn destroy_buffer(&mut self, buffer: BufferId);
    fn create_render_target(&mut self, width: u32, height: u32) -> RenderTargetId;
    fn destroy_render_target(&mut self, target: RenderTargetId);
    fn create_render_pass(&mut self, target: RenderTargetId) -> RenderPassId;
    fn create_pipeline(&mut self, info: &PipelineCreateInfo) -> PipelineHandle;
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    // ── Buffer mapping & writes ──────────────────────────────────────────
    fn map_buffer(&mut self, buffer: BufferId);
    fn unmap_buffer(&mut self, buffer: BufferId);
    /// Writes into a mapped buffer.
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);

    // ── Command buffers ──────────────────────────────────────────────────
    /// Batch-allocates `count` command buffers in one backend call.
    fn allocate_command_buffers(
        &mut self,
        level: CommandBufferLevel,
        count: u32,
    ) -> Vec<CommandBufferId>;
    fn reset_command_buffer(&mut self, command_buffer: CommandBufferId);
    fn begin_command_buffer(&mut self, command_buffer: CommandBufferId);
    fn end_command_buffer(&mut self, command_buffer: CommandBufferId);

    // ── Recording ────────────────────────────────────────────────────────
    fn begin_render_pass(
        &mut self,
        command_buffer: CommandBufferId,
        target: RenderTargetId,
        clear_color: Option<Vec4>,
    );
    fn end_render_pass(&mut self, command_buffer: CommandBufferId);
    fn bind_pipeline(&mut self, command_buffer: CommandBufferId, pipeline: PipelineHandle);
    fn set_scissor(&mut self, command_buffer: CommandBufferId, scissor: Option<ClippingBox>);
    fn bind_uniform_buffer(
        &mut self,
        command_buffer: CommandBufferId,
        buffer: BufferId,
        offset: u64,
        size: u64,
    );
    fn draw(&mut self, command_buffer: CommandBufferId, vertex_count: u32, instance_count: u32);

    // ── Synchronization ──────────────────────────────────────────────────
    fn create_fence(&mut self) -> FenceId;
    fn wait_for_fence(&mut self, fence: FenceId);
    fn reset_fence(&mut self, fence: FenceId);
    fn create_semaphore(&mut self) -> SemaphoreId;

    // ── Frame boundary ───────────────────────────────────────────────────
    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainId,
        signal: SemaphoreId,
    ) -> Result<u32, SwapchainError>;
    fn submit(
        &mut self,
        command_buffer: CommandBufferId,
        wait: SemaphoreId,
        signal: SemaphoreId,
        fence: FenceId,
    );
    fn present(
        &mut self,
        swapchain: SwapchainId,
        image_index: u32,
        wait: SemaphoreId,
    ) -> Result<(), SwapchainError>;
}
