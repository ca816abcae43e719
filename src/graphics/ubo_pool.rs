//! UBO Pool
//!
//! Slab allocator handing out fixed-size uniform-buffer blocks from pages
//! sized `block_size * blocks_per_page`. Allocation pops a free block
//! index; releasing pushes it back. When the free queue runs dry a new
//! page is created through the controller and its block indices are
//! appended in one go. Pages grow the pool — it never shrinks.
//!
//! # Mapping
//!
//! Writes come in two flavours:
//! - [`write`](UboPool::write) maps the page, writes, and unmaps again —
//!   unless the page was already mapped, in which case it writes and
//!   *leaves it mapped* (whoever mapped it manages the unmap).
//! - [`write_keep_mapped`](UboPool::write_keep_mapped) maps on demand and
//!   keeps the page mapped for further writes this frame; the caller pairs
//!   it with [`unmap_all`](UboPool::unmap_all) at frame end.

use crate::graphics::controller::{BufferDesc, BufferId, GraphicsController};

/// A block checked out of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UboAllocation {
    /// Page the block lives in.
    page: u32,
    /// Block index within the pool (global, not per page).
    block: u32,
    /// Byte offset within the page's buffer.
    offset: u64,
}

impl UboAllocation {
    #[inline]
    #[must_use]
    pub fn buffer_offset(&self) -> u64 {
        self.offset
    }
}

struct Page {
    buffer: BufferId,
    mapped: bool,
}

/// Pool of fixed-size uniform-buffer blocks.
pub struct UboPool {
    block_size: u64,
    blocks_per_page: u32,
    pages: Vec<Page>,
    /// Free block indices, used as a stack.
    free_indices: Vec<u32>,
}

impl UboPool {
    /// Creates an empty pool; the first allocation creates the first page.
    ///
    /// `block_size` should already include any backend alignment padding.
    #[must_use]
    pub fn new(block_size: u64, blocks_per_page: u32) -> Self {
        assert!(block_size > 0 && blocks_per_page > 0);
        Self {
            block_size,
            blocks_per_page,
            pages: Vec::new(),
            free_indices: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Total blocks across all pages.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.pages.len() as u32 * self.blocks_per_page
    }

    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_indices.len()
    }

    /// Backend buffer for an allocation (for bind calls).
    #[must_use]
    pub fn buffer_of(&self, allocation: UboAllocation) -> BufferId {
        self.pages[allocation.page as usize].buffer
    }

    /// Pops a free block, growing by one page when the queue is empty.
    pub fn allocate(&mut self, controller: &mut dyn GraphicsController) -> UboAllocation {
        if self.free_indices.is_empty() {
            self.add_page(controller);
        }
        let block = self
            .free_indices
            .pop()
            .expect("page growth refills the free queue");
        let page = block / self.blocks_per_page;
        let offset = u64::from(block % self.blocks_per_page) * self.block_size;
        UboAllocation {
            page,
            block,
            offset,
        }
    }

    /// Returns a block to the pool. Releasing an allocation that does not
    /// belong to this pool is ignored.
    pub fn release(&mut self, allocation: UboAllocation) {
        if allocation.page as usize >= self.pages.len() {
            log::debug!("release of a foreign UBO allocation ignored");
            return;
        }
        debug_assert!(
            !self.free_indices.contains(&allocation.block),
            "double release of UBO block"
        );
        self.free_indices.push(allocation.block);
    }

    /// Map-write-unmap, unless the page is already mapped — then the write
    /// lands through the existing mapping, which is left in place.
    pub fn write(
        &mut self,
        controller: &mut dyn GraphicsController,
        allocation: UboAllocation,
        data: &[u8],
    ) {
        debug_assert!(data.len() as u64 <= self.block_size);
        let page = &mut self.pages[allocation.page as usize];
        if page.mapped {
            controller.write_buffer(page.buffer, allocation.offset, data);
        } else {
            controller.map_buffer(page.buffer);
            controller.write_buffer(page.buffer, allocation.offset, data);
            controller.unmap_buffer(page.buffer);
        }
    }

    /// Maps the page on demand and keeps it mapped for subsequent writes.
    /// Pair with [`unmap_all`](Self::unmap_all) at the end of the frame.
    pub fn write_keep_mapped(
        &mut self,
        controller: &mut dyn GraphicsController,
        allocation: UboAllocation,
        data: &[u8],
    ) {
        debug_assert!(data.len() as u64 <= self.block_size);
        let page = &mut self.pages[allocation.page as usize];
        if !page.mapped {
            controller.map_buffer(page.buffer);
            page.mapped = true;
        }
        controller.write_buffer(page.buffer, allocation.offset, data);
    }

    /// Typed write of a plain-old-data value.
    pub fn write_value<T: bytemuck::Pod>(
        &mut self,
        controller: &mut dyn GraphicsController,
        allocation: UboAllocation,
        value: &T,
    ) {
        self.write_keep_mapped(controller, allocation, bytemuck::bytes_of(value));
    }

    /// Unmaps every page kept mapped by [`write_keep_mapped`].
    pub fn unmap_all(&mut self, controller: &mut dyn GraphicsController) {
        for page in &mut self.pages {
            if page.mapped {
                controller.unmap_buffer(page.buffer);
                page.mapped = false;
            }
        }
    }

    fn add_page(&mut self, controller: &mut dyn GraphicsController) {
        let buffer = controller.create_buffer(&BufferDesc {
            size: self.block_size * u64::from(self.blocks_per_page),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mappable: true,
        });
        let page_index = self.pages.len() as u32;
        self.pages.push(Page {
            buffer,
            mapped: false,
        });
        let first = page_index * self.blocks_per_page;
        // Reverse so allocation order runs front-to-back within the page.
        self.free_indices
            .extend((first..first + self.blocks_per_page).rev());
    }
}
