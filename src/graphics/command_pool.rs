//! Command Pool
//!
//! Two free-list-backed slabs of command buffers (primary and secondary).
//! The free list is intrusive: each slot embeds the index of the next free
//! slot, so the whole pool lives in one contiguous vector per level. When
//! the list runs dry the slab doubles, batch-allocating the delta from the
//! backend in a single call and linking all new slots in.

use crate::graphics::controller::{CommandBufferId, GraphicsController};

pub use crate::graphics::controller::CommandBufferLevel;

/// Sentinel terminating the intrusive free list.
const INVALID_INDEX: u32 = u32::MAX;

struct Slot {
    id: CommandBufferId,
    next_free_index: u32,
}

struct Slab {
    level: CommandBufferLevel,
    slots: Vec<Slot>,
    free_head: u32,
}

impl Slab {
    fn new(level: CommandBufferLevel) -> Self {
        Self {
            level,
            slots: Vec::new(),
            free_head: INVALID_INDEX,
        }
    }

    /// Grows the slab to `new_capacity`, batch-allocating the delta in one
    /// backend call and linking the new slots into the free list.
    fn resize(&mut self, controller: &mut dyn GraphicsController, new_capacity: usize) {
        let current = self.slots.len();
        debug_assert!(new_capacity > current);
        let delta = (new_capacity - current) as u32;

        let ids = controller.allocate_command_buffers(self.level, delta);
        debug_assert_eq!(ids.len() as u32, delta);

        for id in ids {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                id,
                next_free_index: self.free_head,
            });
            self.free_head = index;
        }
    }

    fn allocate(
        &mut self,
        controller: &mut dyn GraphicsController,
        initial_capacity: usize,
    ) -> (u32, CommandBufferId) {
        if self.free_head == INVALID_INDEX {
            let new_capacity = if self.slots.is_empty() {
                initial_capacity
            } else {
                self.slots.len() * 2
            };
            self.resize(controller, new_capacity);
        }
        let index = self.free_head;
        let slot = &mut self.slots[index as usize];
        self.free_head = slot.next_free_index;
        slot.next_free_index = INVALID_INDEX;
        (index, slot.id)
    }

    fn release(
        &mut self,
        controller: &mut dyn GraphicsController,
        index: u32,
        hard_reset: bool,
    ) {
        let slot = &mut self.slots[index as usize];
        debug_assert_eq!(
            slot.next_free_index, INVALID_INDEX,
            "double release of command buffer"
        );
        if hard_reset {
            controller.reset_command_buffer(slot.id);
        }
        slot.next_free_index = self.free_head;
        self.free_head = index;
    }

    fn free_count(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.free_head;
        while cursor != INVALID_INDEX {
            count += 1;
            cursor = self.slots[cursor as usize].next_free_index;
        }
        count
    }
}

/// Pool of pre-allocated primary and secondary command buffers.
pub struct CommandPool {
    primary: Slab,
    secondary: Slab,
    initial_capacity: usize,
}

impl CommandPool {
    /// Creates an empty pool; slabs materialize on first allocation.
    #[must_use]
    pub fn new(initial_capacity: usize) -> Self {
        assert!(initial_capacity > 0);
        Self {
            primary: Slab::new(CommandBufferLevel::Primary),
            secondary: Slab::new(CommandBufferLevel::Secondary),
            initial_capacity,
        }
    }

    /// Pops a command buffer from the level's free list, doubling the slab
    /// if exhausted. Returns the slot index (for release) and the id.
    pub fn allocate(
        &mut self,
        controller: &mut dyn GraphicsController,
        level: CommandBufferLevel,
    ) -> (u32, CommandBufferId) {
        let initial_capacity = self.initial_capacity;
        self.slab_mut(level).allocate(controller, initial_capacity)
    }

    /// Returns a command buffer to the free list; `hard_reset` also resets
    /// the buffer at the backend level.
    pub fn release(
        &mut self,
        controller: &mut dyn GraphicsController,
        level: CommandBufferLevel,
        index: u32,
        hard_reset: bool,
    ) {
        self.slab_mut(level).release(controller, index, hard_reset);
    }

    /// Total slots reserved for a level.
    #[must_use]
    pub fn capacity(&self, level: CommandBufferLevel) -> usize {
        self.slab(level).slots.len()
    }

    /// Slots currently on the free list for a level.
    #[must_use]
    pub fn free_count(&self, level: CommandBufferLevel) -> usize {
        self.slab(level).free_count()
    }

    fn slab(&self, level: CommandBufferLevel) -> &Slab {
        match level {
            CommandBufferLevel::Primary => &self.primary,
            CommandBufferLevel::Secondary => &self.secondary,
        }
    }

    fn slab_mut(&mut self, level: CommandBufferLevel) -> &mut Slab {
        match level {
            CommandBufferLevel::Primary => &mut self.primary,
            CommandBufferLevel::Secondary => &mut self.secondary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::NullGraphicsController;

    #[test]
    fn test_allocate_release_round_trip() {
        let mut controller = NullGraphicsController::new();
        let mut pool = CommandPool::new(4);

        let allocated: Vec<_> = (0..4)
            .map(|_| pool.allocate(&mut controller, CommandBufferLevel::Primary))
            .collect();
        assert_eq!(pool.capacity(CommandBufferLevel::Primary), 4);
        assert_eq!(pool.free_count(CommandBufferLevel::Primary), 0);

        for (index, _) in &allocated {
            pool.release(&mut controller, CommandBufferLevel::Primary, *index, false);
        }
        assert_eq!(pool.free_count(CommandBufferLevel::Primary), 4);

        // All slots come back out exactly once.
        let mut seen = std::collections::HashSet::new();
        for _ in 0..4 {
            let (index, _) = pool.allocate(&mut controller, CommandBufferLevel::Primary);
            assert!(seen.insert(index));
        }
        assert_eq!(pool.capacity(CommandBufferLevel::Primary), 4);
    }

    #[test]
    fn test_exhaustion_doubles_with_one_backend_call() {
        let mut controller = NullGraphicsController::new();
        let mut pool = CommandPool::new(2);

        let _a = pool.allocate(&mut controller, CommandBufferLevel::Primary);
        let _b = pool.allocate(&mut controller, CommandBufferLevel::Primary);
        assert_eq!(controller.command_buffer_allocations, 1);

        let _c = pool.allocate(&mut controller, CommandBufferLevel::Primary);
        assert_eq!(pool.capacity(CommandBufferLevel::Primary), 4);
        // The doubling delta was requested in a single batch call.
        assert_eq!(controller.command_buffer_allocations, 2);
    }

    #[test]
    fn test_release_with_hard_reset() {
        let mut controller = NullGraphicsController::new();
        let mut pool = CommandPool::new(2);
        let (index, _) = pool.allocate(&mut controller, CommandBufferLevel::Secondary);

        pool.release(&mut controller, CommandBufferLevel::Secondary, index, true);
        assert_eq!(controller.command_buffer_resets, 1);
    }

    #[test]
    fn test_levels_are_independent() {
        let mut controller = NullGraphicsController::new();
        let mut pool = CommandPool::new(2);
        let _ = pool.allocate(&mut controller, CommandBufferLevel::Primary);
        assert_eq!(pool.capacity(CommandBufferLevel::Primary), 2);
        assert_eq!(pool.capacity(CommandBufferLevel::Secondary), 0);
    }
}
