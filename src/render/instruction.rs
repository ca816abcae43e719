//! Render instructions: the ordered set of render lists produced for one
//! render task in one frame, and the double-buffered container that owns
//! them.
//!
//! Instructions are pooled the same way render items are: the container
//! keeps a cursor per buffer and hands out reset instructions, so list
//! capacity survives across frames.

use glam::{Mat4, Vec4};

use crate::common::BufferIndex;
use crate::render::item::RenderList;
use crate::render::RenderTargetId;
use crate::update::render_task::{RenderTaskKey, Viewport};

/// Everything the render thread needs to draw one task's output.
pub struct RenderInstruction {
    pub task: RenderTaskKey,
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub viewport: Option<Viewport>,
    /// Clear color; `None` when clearing is disabled for the task.
    pub clear_color: Option<Vec4>,
    /// Offscreen target, or `None` for the swapchain framebuffer.
    pub target: Option<RenderTargetId>,

    render_lists: Vec<RenderList>,
    next_free_list: usize,
}

impl RenderInstruction {
    #[must_use]
    pub fn new() -> Self {
        Self {
            task: RenderTaskKey::default(),
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            viewport: None,
            clear_color: None,
            target: None,
            render_lists: Vec::new(),
            next_free_list: 0,
        }
    }

    /// Re-initializes the instruction for a new frame, resetting (not
    /// freeing) its render lists.
    pub fn prepare(&mut self, task: RenderTaskKey, view: Mat4, projection: Mat4) {
        self.task = task;
        self.view_matrix = view;
        self.projection_matrix = projection;
        self.viewport = None;
        self.clear_color = None;
        self.target = None;
        self.next_free_list = 0;
    }

    /// Returns the next reusable render list, reset and ready to fill.
    pub fn get_next_free_render_list(&mut self) -> &mut RenderList {
        if self.next_free_list == self.render_lists.len() {
            self.render_lists.push(RenderList::new());
        }
        let list = &mut self.render_lists[self.next_free_list];
        self.next_free_list += 1;
        list.reset();
        list
    }

    /// Drops the most recently acquired render list (used when a list
    /// turned out empty after culling).
    pub(crate) fn discard_last_render_list(&mut self) {
        debug_assert!(self.next_free_list > 0);
        self.next_free_list -= 1;
    }

    #[inline]
    #[must_use]
    pub fn render_list_count(&self) -> usize {
        self.next_free_list
    }

    #[must_use]
    pub fn get_render_list(&self, index: usize) -> &RenderList {
        assert!(index < self.next_free_list, "render list index out of range");
        &self.render_lists[index]
    }

    pub(crate) fn get_render_list_mut(&mut self, index: usize) -> &mut RenderList {
        assert!(index < self.next_free_list, "render list index out of range");
        &mut self.render_lists[index]
    }

    /// Used render lists, in draw order.
    pub fn render_lists(&self) -> impl Iterator<Item = &RenderList> {
        self.render_lists[..self.next_free_list].iter()
    }
}

impl Default for RenderInstruction {
    fn default() -> Self {
        Self::new()
    }
}

/// Pooled instructions for one buffer index.
#[derive(Default)]
pub struct RenderInstructionSet {
    instructions: Vec<RenderInstruction>,
    count: usize,
}

impl RenderInstructionSet {
    /// Logically empties the set and ensures room for `capacity` tasks.
    pub fn reset_and_reserve(&mut self, capacity: usize) {
        self.count = 0;
        if self.instructions.capacity() < capacity {
            self.instructions
                .reserve(capacity - self.instructions.capacity());
        }
    }

    /// Hands out the next pooled instruction.
    pub fn get_next_free_instruction(&mut self) -> &mut RenderInstruction {
        if self.count == self.instructions.len() {
            self.instructions.push(RenderInstruction::new());
        }
        let instruction = &mut self.instructions[self.count];
        self.count += 1;
        instruction
    }

    /// Drops the most recently acquired instruction (task produced no
    /// visible lists).
    pub(crate) fn discard_last_instruction(&mut self) {
        debug_assert!(self.count > 0);
        self.count -= 1;
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn get(&self, index: usize) -> &RenderInstruction {
        assert!(index < self.count, "instruction index out of range");
        &self.instructions[index]
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> &mut RenderInstruction {
        assert!(index < self.count, "instruction index out of range");
        &mut self.instructions[index]
    }

    /// Instructions for this frame, in task order.
    pub fn iter(&self) -> impl Iterator<Item = &RenderInstruction> {
        self.instructions[..self.count].iter()
    }
}

/// Double-buffered instruction storage.
///
/// The update thread fills the set for the frame's buffer index while the
/// render thread holds the other set. [`take`](Self::take) moves a filled
/// set out for submission; [`restore`](Self::restore) returns its storage
/// for reuse once the render thread is done with it. If a set has not come
/// back yet the update thread starts from an empty one — correctness is
/// unaffected, the frame merely reallocates.
#[derive(Default)]
pub struct RenderInstructionContainer {
    sets: [RenderInstructionSet; 2],
}

impl RenderInstructionContainer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(&mut self, buffer: BufferIndex) -> &mut RenderInstructionSet {
        &mut self.sets[buffer]
    }

    /// Moves the filled set out for submission to the render thread.
    pub fn take(&mut self, buffer: BufferIndex) -> RenderInstructionSet {
        std::mem::take(&mut self.sets[buffer])
    }

    /// Returns a consumed set's storage to its slot.
    pub fn restore(&mut self, buffer: BufferIndex, set: RenderInstructionSet) {
        self.sets[buffer] = set;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_pooling_keeps_list_capacity() {
        let mut set = RenderInstructionSet::default();
        set.reset_and_reserve(2);
        {
            let instruction = set.get_next_free_instruction();
            instruction.prepare(RenderTaskKey::default(), Mat4::IDENTITY, Mat4::IDENTITY);
            let list = instruction.get_next_free_render_list();
            let _ = list.get_next_free_item();
            let _ = list.get_next_free_item();
        }
        assert_eq!(set.count(), 1);

        // Next frame: same storage, lists reset but cached.
        set.reset_and_reserve(2);
        let instruction = set.get_next_free_instruction();
        let list = instruction.get_next_free_render_list();
        assert_eq!(list.count(), 0);
        assert_eq!(list.cached_item_count(), 2);
    }

    #[test]
    fn test_container_take_restore_round_trip() {
        let mut container = RenderInstructionContainer::new();
        container.at(0).reset_and_reserve(1);
        container.at(0).get_next_free_instruction();

        let taken = container.take(0);
        assert_eq!(taken.count(), 1);
        assert_eq!(container.at(0).count(), 0);

        container.restore(0, taken);
        assert_eq!(container.at(0).count(), 1);
    }
}
