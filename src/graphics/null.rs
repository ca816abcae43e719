//! Null graphics controller.
//!
//! A backend that allocates ids and records state transitions without
//! touching any GPU. Used for headless operation and by the test suites to
//! observe the exact call sequence the core issues. Acquire/present can be
//! scripted to fail so swapchain invalidation paths are exercisable.

use glam::Vec4;
use rustc_hash::FxHashSet;

use crate::graphics::controller::{
    BufferDesc, BufferId, CommandBufferId, CommandBufferLevel, FenceId, GraphicsController,
    PipelineCreateInfo, PipelineHandle, RenderPassId, RenderTargetId, SemaphoreId, SwapchainError,
    SwapchainId,
};
use crate::scene::ClippingBox;

/// Headless [`GraphicsController`] with call accounting.
#[derive(Default)]
pub struct NullGraphicsController {
    pub next_id: u32,

    /// Buffers currently mapped.
    pub mapped_buffers: FxHashSet<BufferId>,
    /// Buffers destroyed through the controller.
    pub destroyed_buffers: Vec<BufferId>,
    /// Pipelines destroyed through the controller.
    pub destroyed_pipelines: Vec<PipelineHandle>,

    /// Image index the next acquire returns.
    pub next_image_index: u32,
    /// Scripted failure for the next acquire call.
    pub fail_next_acquire: Option<SwapchainError>,
    /// Scripted failure for the next present call.
    pub fail_next_present: Option<SwapchainError>,

    // Call counters, in issue order where it matters.
    pub buffer_writes: u32,
    pub map_calls: u32,
    pub unmap_calls: u32,
    pub command_buffer_allocations: u32,
    pub command_buffer_resets: u32,
    pub fence_waits: u32,
    pub submits: u32,
    pub presents: u32,
    pub draws: u32,
    pub pipelines_created: u32,
}

impl NullGraphicsController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GraphicsController for NullGraphicsController {
    fn create_buffer(&mut self, _desc: &BufferDesc) -> BufferId {
        BufferId(self.next())
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.destroyed_buffers.push(buffer);
    }

    fn create_render_target(&mut self, _width: u32, _height: u32) -> RenderTargetId {
        RenderTargetId(self.next())
    }

    fn destroy_render_target(&mut self, _target: RenderTargetId) {}

    fn create_render_pass(&mut self, _target: RenderTargetId) -> RenderPassId {
        RenderPassId(self.next())
    }

    fn create_pipeline(&mut self, _info: &PipelineCreateInfo) -> PipelineHandle {
        self.pipelines_created += 1;
        PipelineHandle(self.next())
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.destroyed_pipelines.push(pipeline);
    }

    fn map_buffer(&mut self, buffer: BufferId) {
        self.map_calls += 1;
        self.mapped_buffers.insert(buffer);
    }

    fn unmap_buffer(&mut self, buffer: BufferId) {
        self.unmap_calls += 1;
        self.mapped_buffers.remove(&buffer);
    }

    fn write_buffer(&mut self, buffer: BufferId, _offset: u64, _data: &[u8]) {
        debug_assert!(
            self.mapped_buffers.contains(&buffer),
            "write to an unmapped buffer"
        );
        self.buffer_writes += 1;
    }

    fn allocate_command_buffers(
        &mut self,
        _level: CommandBufferLevel,
        count: u32,
    ) -> Vec<CommandBufferId> {
        self.command_buffer_allocations += 1;
        (0..count).map(|_| CommandBufferId(self.next())).collect()
    }

    fn reset_command_buffer(&mut self, _command_buffer: CommandBufferId) {
        self.command_buffer_resets += 1;
    }

    fn begin_command_buffer(&mut self, _command_buffer: CommandBufferId) {}

    fn end_command_buffer(&mut self, _command_buffer: CommandBufferId) {}

    fn begin_render_pass(
        &mut self,
        _command_buffer: CommandBufferId,
        _target: RenderTargetId,
        _clear_color: Option<Vec4>,
    ) {
    }

    fn end_render_pass(&mut self, _command_buffer: CommandBufferId) {}

    fn bind_pipeline(&mut self, _command_buffer: CommandBufferId, _pipeline: PipelineHandle) {}

    fn set_scissor(&mut self, _command_buffer: CommandBufferId, _scissor: Option<ClippingBox>) {}

    fn bind_uniform_buffer(
        &mut self,
        _command_buffer: CommandBufferId,
        _buffer: BufferId,
        _offset: u64,
        _size: u64,
    ) {
    }

    fn draw(&mut self, _command_buffer: CommandBufferId, _vertex_count: u32, _instance_count: u32) {
        self.draws += 1;
    }

    fn create_fence(&mut self) -> FenceId {
        FenceId(self.next())
    }

    fn wait_for_fence(&mut self, _fence: FenceId) {
        self.fence_waits += 1;
    }

    fn reset_fence(&mut self, _fence: FenceId) {}

    fn create_semaphore(&mut self) -> SemaphoreId {
        SemaphoreId(self.next())
    }

    fn acquire_next_image(
        &mut self,
        _swapchain: SwapchainId,
        _signal: SemaphoreId,
    ) -> Result<u32, SwapchainError> {
        if let Some(error) = self.fail_next_acquire.take() {
            return Err(error);
        }
        Ok(self.next_image_index)
    }

    fn submit(
        &mut self,
        _command_buffer: CommandBufferId,
        _wait: SemaphoreId,
        _signal: SemaphoreId,
        _fence: FenceId,
    ) {
        self.submits += 1;
    }

    fn present(
        &mut self,
        _swapchain: SwapchainId,
        _image_index: u32,
        _wait: SemaphoreId,
    ) -> Result<(), SwapchainError> {
        if let Some(error) = self.fail_next_present.take() {
            return Err(error);
        }
        self.presents += 1;
        Ok(())
    }
}
