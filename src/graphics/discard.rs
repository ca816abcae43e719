//! Deferred GPU resource destruction.
//!
//! Resources released while a frame may still reference them are parked
//! here, keyed by frame slot, and destroyed only after that slot's
//! end-of-frame fence has completed. The swapchain drains the matching
//! slot right after its fence wait.

use crate::graphics::controller::{BufferId, GraphicsController, PipelineHandle, RenderTargetId};

/// A GPU resource awaiting safe destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardedResource {
    Buffer(BufferId),
    Pipeline(PipelineHandle),
    RenderTarget(RenderTargetId),
}

/// Per-frame-slot lists of resources to destroy.
pub struct DiscardQueue {
    slots: Vec<Vec<DiscardedResource>>,
}

impl DiscardQueue {
    /// `slot_count` matches the number of in-flight frames (swapchain
    /// buffer count).
    #[must_use]
    pub fn new(slot_count: usize) -> Self {
        assert!(slot_count > 0);
        Self {
            slots: (0..slot_count).map(|_| Vec::new()).collect(),
        }
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of resources parked for a slot.
    #[must_use]
    pub fn pending_count(&self, slot: usize) -> usize {
        self.slots[slot].len()
    }

    /// Parks a resource for destruction once `slot`'s frame completes.
    pub fn discard(&mut self, slot: usize, resource: DiscardedResource) {
        self.slots[slot].push(resource);
    }

    /// Destroys everything parked for `slot`. Called after the slot's
    /// fence has been waited on.
    pub fn process(&mut self, slot: usize, controller: &mut dyn GraphicsController) {
        for resource in self.slots[slot].drain(..) {
            match resource {
                DiscardedResource::Buffer(buffer) => controller.destroy_buffer(buffer),
                DiscardedResource::Pipeline(pipeline) => controller.destroy_pipeline(pipeline),
                DiscardedResource::RenderTarget(target) => {
                    controller.destroy_render_target(target);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::NullGraphicsController;

    #[test]
    fn test_discard_waits_for_matching_slot() {
        let mut controller = NullGraphicsController::new();
        let mut queue = DiscardQueue::new(2);

        queue.discard(0, DiscardedResource::Buffer(BufferId(1)));
        queue.discard(1, DiscardedResource::Buffer(BufferId(2)));

        queue.process(0, &mut controller);
        assert_eq!(controller.destroyed_buffers, vec![BufferId(1)]);
        assert_eq!(queue.pending_count(0), 0);
        assert_eq!(queue.pending_count(1), 1);

        queue.process(1, &mut controller);
        assert_eq!(controller.destroyed_buffers, vec![BufferId(1), BufferId(2)]);
    }
}
