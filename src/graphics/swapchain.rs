//! Swapchain
//!
//! Owns one framebuffer, master command buffer and end-of-frame fence per
//! presentable image, plus per-buffer-index semaphore pairs created lazily
//! on first use.
//!
//! # Invalidation
//!
//! Once an acquire or present call reports non-success the swapchain
//! transitions to the terminal [`SwapchainState::Invalid`] state and
//! refuses further acquire/present calls. Recovery is external: the owner
//! recreates the swapchain; there is no automatic retry.

use crate::graphics::controller::{
    CommandBufferId, CommandBufferLevel, FenceId, GraphicsController, RenderTargetId, SemaphoreId,
    SwapchainId,
};
use crate::graphics::discard::DiscardQueue;

/// Lifecycle state of the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Valid,
    /// Terminal until recreated externally.
    Invalid,
}

struct SwapchainBuffer {
    framebuffer: RenderTargetId,
    master_command_buffer: CommandBufferId,
    end_of_frame_fence: FenceId,
    /// Work was submitted against this buffer; its fence must be waited
    /// before reuse.
    submitted: bool,
}

/// Acquire/submit semaphores for one buffer index.
#[derive(Clone, Copy)]
struct SemaphorePair {
    acquire: SemaphoreId,
    submit: SemaphoreId,
}

/// Cycles through a small set of presentable framebuffers.
pub struct Swapchain {
    id: SwapchainId,
    buffers: Vec<SwapchainBuffer>,
    /// Lazily created per buffer index on first acquire.
    semaphores: Vec<Option<SemaphorePair>>,
    /// Cycles modulo the buffer count and selects the semaphore pair,
    /// independent of which image index the backend returns.
    frame_counter: u32,
    acquired_image: Option<u32>,
    state: SwapchainState,
    discard_queue: DiscardQueue,
}

impl Swapchain {
    /// Builds per-buffer resources for `buffer_count` images of
    /// `width`×`height`.
    pub fn new(
        controller: &mut dyn GraphicsController,
        id: SwapchainId,
        buffer_count: usize,
        width: u32,
        height: u32,
    ) -> Self {
        assert!(buffer_count > 0);
        let buffers = (0..buffer_count)
            .map(|_| SwapchainBuffer {
                framebuffer: controller.create_render_target(width, height),
                master_command_buffer: controller
                    .allocate_command_buffers(CommandBufferLevel::Primary, 1)[0],
                end_of_frame_fence: controller.create_fence(),
                submitted: false,
            })
            .collect();
        Self {
            id,
            buffers,
            semaphores: vec![None; buffer_count],
            frame_counter: 0,
            acquired_image: None,
            state: SwapchainState::Valid,
            discard_queue: DiscardQueue::new(buffer_count),
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state == SwapchainState::Valid
    }

    #[inline]
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    #[must_use]
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    /// Queue for resources that must outlive in-flight frames; drained
    /// per-slot after the matching fence completes.
    pub fn discard_queue(&mut self) -> &mut DiscardQueue {
        &mut self.discard_queue
    }

    /// Master command buffer of the currently acquired image.
    #[must_use]
    pub fn current_command_buffer(&self) -> Option<CommandBufferId> {
        self.acquired_image
            .map(|image| self.buffers[image as usize].master_command_buffer)
    }

    /// Acquires the next presentable framebuffer.
    ///
    /// On success the previous frame in this slot is fenced off, deferred
    /// resources are collected, and the master command buffer is reset and
    /// begun. On any backend non-success the swapchain becomes invalid and
    /// `None` is returned — the caller must recreate it, not retry.
    pub fn acquire_next_framebuffer(
        &mut self,
        controller: &mut dyn GraphicsController,
    ) -> Option<RenderTargetId> {
        if self.state == SwapchainState::Invalid {
            return None;
        }

        let pair = self.semaphore_pair(controller);
        let image = match controller.acquire_next_image(self.id, pair.acquire) {
            Ok(image) => image,
            Err(error) => {
                log::warn!("swapchain acquire failed: {error:?}");
                self.state = SwapchainState::Invalid;
                return None;
            }
        };

        let buffer = &mut self.buffers[image as usize];
        if buffer.submitted {
            controller.wait_for_fence(buffer.end_of_frame_fence);
            controller.reset_fence(buffer.end_of_frame_fence);
            buffer.submitted = false;
        }

        // The frame that last used this slot has fully completed; its
        // discarded resources are now safe to destroy.
        self.discard_queue.process(image as usize, controller);

        let buffer = &self.buffers[image as usize];
        controller.reset_command_buffer(buffer.master_command_buffer);
        controller.begin_command_buffer(buffer.master_command_buffer);

        self.acquired_image = Some(image);
        Some(buffer.framebuffer)
    }

    /// Ends and submits the master command buffer, then presents.
    ///
    /// A non-success present invalidates the swapchain. Returns whether
    /// the frame was presented.
    pub fn present(&mut self, controller: &mut dyn GraphicsController) -> bool {
        if self.state == SwapchainState::Invalid {
            return false;
        }
        let Some(image) = self.acquired_image.take() else {
            log::warn!("present called with no acquired framebuffer");
            return false;
        };

        let pair = self.semaphore_pair(controller);
        let buffer = &mut self.buffers[image as usize];
        controller.end_command_buffer(buffer.master_command_buffer);
        controller.submit(
            buffer.master_command_buffer,
            pair.acquire,
            pair.submit,
            buffer.end_of_frame_fence,
        );
        buffer.submitted = true;

        let result = controller.present(self.id, image, pair.submit);
        self.frame_counter = self.frame_counter.wrapping_add(1);

        match result {
            Ok(()) => true,
            Err(error) => {
                log::warn!("swapchain present failed: {error:?}");
                self.state = SwapchainState::Invalid;
                false
            }
        }
    }

    /// The semaphore pair for the current frame slot, created on first use.
    fn semaphore_pair(&mut self, controller: &mut dyn GraphicsController) -> SemaphorePair {
        let slot = self.frame_counter as usize % self.buffers.len();
        *self.semaphores[slot].get_or_insert_with(|| SemaphorePair {
            acquire: controller.create_semaphore(),
            submit: controller.create_semaphore(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::controller::{BufferId, SwapchainError};
    use crate::graphics::discard::DiscardedResource;
    use crate::graphics::NullGraphicsController;

    fn swapchain(controller: &mut NullGraphicsController) -> Swapchain {
        Swapchain::new(controller, SwapchainId(1), 2, 640, 480)
    }

    #[test]
    fn test_acquire_present_cycle() {
        let mut controller = NullGraphicsController::new();
        let mut chain = swapchain(&mut controller);

        let framebuffer = chain.acquire_next_framebuffer(&mut controller);
        assert!(framebuffer.is_some());
        assert!(chain.current_command_buffer().is_some());

        assert!(chain.present(&mut controller));
        assert_eq!(controller.submits, 1);
        assert_eq!(controller.presents, 1);
        assert_eq!(chain.frame_counter(), 1);
        assert!(chain.current_command_buffer().is_none());
    }

    #[test]
    fn test_failed_acquire_invalidates() {
        let mut controller = NullGraphicsController::new();
        let mut chain = swapchain(&mut controller);

        controller.fail_next_acquire = Some(SwapchainError::OutOfDate);
        assert!(chain.acquire_next_framebuffer(&mut controller).is_none());
        assert_eq!(chain.state(), SwapchainState::Invalid);

        // Invalid is terminal: further acquires refuse without touching
        // the backend.
        assert!(chain.acquire_next_framebuffer(&mut controller).is_none());
        assert!(!chain.present(&mut controller));
        assert_eq!(controller.presents, 0);
    }

    #[test]
    fn test_failed_present_invalidates() {
        let mut controller = NullGraphicsController::new();
        let mut chain = swapchain(&mut controller);

        chain.acquire_next_framebuffer(&mut controller);
        controller.fail_next_present = Some(SwapchainError::SurfaceLost);
        assert!(!chain.present(&mut controller));
        assert_eq!(chain.state(), SwapchainState::Invalid);
    }

    #[test]
    fn test_reacquired_slot_waits_previous_fence() {
        let mut controller = NullGraphicsController::new();
        let mut chain = swapchain(&mut controller);

        // Frame 0 on image 0, then frame 1 acquires image 0 again.
        controller.next_image_index = 0;
        chain.acquire_next_framebuffer(&mut controller);
        chain.present(&mut controller);

        chain.acquire_next_framebuffer(&mut controller);
        assert_eq!(controller.fence_waits, 1);
    }

    #[test]
    fn test_deferred_destruction_after_fence() {
        let mut controller = NullGraphicsController::new();
        let mut chain = swapchain(&mut controller);

        chain
            .discard_queue()
            .discard(0, DiscardedResource::Buffer(BufferId(42)));

        // Acquiring image 1 must not touch slot 0's garbage.
        controller.next_image_index = 1;
        chain.acquire_next_framebuffer(&mut controller);
        assert!(controller.destroyed_buffers.is_empty());
        chain.present(&mut controller);

        controller.next_image_index = 0;
        chain.acquire_next_framebuffer(&mut controller);
        assert_eq!(controller.destroyed_buffers, vec![BufferId(42)]);
    }

    #[test]
    fn test_semaphores_created_lazily_per_slot() {
        let mut controller = NullGraphicsController::new();
        let mut chain = swapchain(&mut controller);
        let before = controller.next_id;

        chain.acquire_next_framebuffer(&mut controller);
        chain.present(&mut controller);
        let after_first = controller.next_id;
        // Two semaphores for slot 0.
        assert_eq!(after_first - before, 2);

        // Slot 1 creates its own pair; returning to slot 0 creates none.
        chain.acquire_next_framebuffer(&mut controller);
        chain.present(&mut controller);
        chain.acquire_next_framebuffer(&mut controller);
        chain.present(&mut controller);
        assert_eq!(controller.next_id - after_first, 2);
    }
}
