//! Render items and the per-frame render lists that pool them.
//!
//! A [`RenderList`] is reset → filled → consumed → reset every frame. Items
//! are recycled through a next-free-index cursor: [`RenderList::reset`]
//! logically empties the list without freeing, and steady-state frames
//! allocate nothing. [`RenderList::release_unused_items`] is the explicit
//! housekeeping call that trims capacity back to the used count.

use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};

use crate::render::RendererKey;
use crate::scene::{ClippingBox, LayerKey, NodeKey};

bitflags! {
    /// Per-list stencil/content flags handed to the render thread.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct RenderListFlags: u8 {
        /// The stencil buffer is needed while drawing this list.
        const STENCIL_BUFFER_ENABLED = 1 << 0;
        /// Items in this list write the stencil buffer.
        const STENCIL_WRITE          = 1 << 1;
        /// Clear the stencil buffer before drawing.
        const STENCIL_CLEAR          = 1 << 2;
        /// List contains color render items (as opposed to overlay items).
        const HAS_COLOR_RENDER_ITEMS = 1 << 3;
    }
}

/// One drawable captured for one frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderItem {
    pub renderer: RendererKey,
    pub node: NodeKey,
    pub model_matrix: Mat4,
    pub model_view_matrix: Mat4,
    pub size: Vec3,
    pub color: Vec4,
    pub depth_index: i32,
    pub is_opaque: bool,
    /// Whether anything about this item changed since the previous frame —
    /// lets the render thread skip redundant uniform updates.
    pub is_updated: bool,
}

impl Default for RenderItem {
    fn default() -> Self {
        Self {
            renderer: RendererKey::default(),
            node: NodeKey::default(),
            model_matrix: Mat4::IDENTITY,
            model_view_matrix: Mat4::IDENTITY,
            size: Vec3::ZERO,
            color: Vec4::ONE,
            depth_index: 0,
            is_opaque: true,
            is_updated: true,
        }
    }
}

/// Ordered, reusable collection of render items for one layer slice.
pub struct RenderList {
    items: Vec<RenderItem>,
    /// Logical item count; everything past it is retained capacity.
    next_free_index: usize,

    flags: RenderListFlags,
    clipping_enabled: bool,
    clipping_box: ClippingBox,

    // Reuse bookkeeping. These describe the *cached* contents and survive
    // reset() so the next frame can detect an unchanged renderable set.
    source_layer: Option<LayerKey>,
    cached_checksum: u64,
}

impl RenderList {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_free_index: 0,
            flags: RenderListFlags::empty(),
            clipping_enabled: false,
            clipping_box: ClippingBox::default(),
            source_layer: None,
            cached_checksum: 0,
        }
    }

    // ── Item pooling ─────────────────────────────────────────────────────

    /// Returns the next reusable item slot, growing by push-back only when
    /// the cached capacity is exceeded.
    pub fn get_next_free_item(&mut self) -> &mut RenderItem {
        if self.next_free_index == self.items.len() {
            self.items.push(RenderItem::default());
        }
        let item = &mut self.items[self.next_free_index];
        self.next_free_index += 1;
        item
    }

    /// Logically empties the list for the next frame. No memory is freed
    /// and the reuse bookkeeping is kept.
    pub fn reset(&mut self) {
        self.next_free_index = 0;
        self.flags = RenderListFlags::empty();
        self.clipping_enabled = false;
    }

    /// Marks every cached item as used again, skipping re-population when
    /// the previous frame's contents are known to still be valid.
    pub fn reuse_cached_items(&mut self) {
        self.next_free_index = self.items.len();
    }

    /// Trims retained capacity down to the used count. Explicit
    /// housekeeping, not called automatically.
    pub fn release_unused_items(&mut self) {
        self.items.truncate(self.next_free_index);
    }

    /// Logical size this frame.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.next_free_index
    }

    /// Allocated capacity, including unused cached items.
    #[inline]
    #[must_use]
    pub fn cached_item_count(&self) -> usize {
        self.items.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_free_index == 0
    }

    #[must_use]
    pub fn get_item(&self, index: usize) -> &RenderItem {
        assert!(index < self.next_free_index, "render item index out of range");
        &self.items[index]
    }

    pub fn get_item_mut(&mut self, index: usize) -> &mut RenderItem {
        assert!(index < self.next_free_index, "render item index out of range");
        &mut self.items[index]
    }

    /// Used items, in order.
    #[must_use]
    pub fn items(&self) -> &[RenderItem] {
        &self.items[..self.next_free_index]
    }

    pub(crate) fn items_mut(&mut self) -> &mut [RenderItem] {
        &mut self.items[..self.next_free_index]
    }

    // ── Flags & clipping ─────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn flags(&self) -> RenderListFlags {
        self.flags
    }

    pub fn insert_flags(&mut self, flags: RenderListFlags) {
        self.flags |= flags;
    }

    pub fn set_has_color_render_items(&mut self, has: bool) {
        if has {
            self.flags |= RenderListFlags::HAS_COLOR_RENDER_ITEMS;
        } else {
            self.flags -= RenderListFlags::HAS_COLOR_RENDER_ITEMS;
        }
    }

    #[inline]
    #[must_use]
    pub fn has_color_render_items(&self) -> bool {
        self.flags.contains(RenderListFlags::HAS_COLOR_RENDER_ITEMS)
    }

    pub fn set_clipping(&mut self, enabled: bool, clipping_box: ClippingBox) {
        self.clipping_enabled = enabled;
        self.clipping_box = clipping_box;
    }

    #[must_use]
    pub fn clipping_box(&self) -> Option<ClippingBox> {
        self.clipping_enabled.then_some(self.clipping_box)
    }

    pub fn set_source_layer(&mut self, layer: LayerKey) {
        self.source_layer = Some(layer);
    }

    #[inline]
    #[must_use]
    pub fn source_layer(&self) -> Option<LayerKey> {
        self.source_layer
    }

    /// Checksum of the renderable set the cached items were built from.
    pub(crate) fn cached_checksum(&self) -> u64 {
        self.cached_checksum
    }

    pub(crate) fn set_cached_checksum(&mut self, checksum: u64) {
        self.cached_checksum = checksum;
    }
}

impl Default for RenderList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(list: &mut RenderList, count: usize) {
        for i in 0..count {
            let item = list.get_next_free_item();
            item.depth_index = i as i32;
        }
    }

    #[test]
    fn test_reset_then_refill_does_not_grow() {
        let mut list = RenderList::new();
        fill(&mut list, 8);
        assert_eq!(list.count(), 8);
        assert_eq!(list.cached_item_count(), 8);

        list.reset();
        assert!(list.is_empty());
        assert_eq!(list.cached_item_count(), 8);

        fill(&mut list, 8);
        assert_eq!(list.cached_item_count(), 8);
    }

    #[test]
    fn test_overfill_grows_by_shortfall_only() {
        let mut list = RenderList::new();
        fill(&mut list, 4);
        list.reset();
        fill(&mut list, 6);
        assert_eq!(list.count(), 6);
        assert_eq!(list.cached_item_count(), 6);
    }

    #[test]
    fn test_release_unused_items_trims() {
        let mut list = RenderList::new();
        fill(&mut list, 10);
        list.reset();
        fill(&mut list, 3);
        list.release_unused_items();
        assert_eq!(list.cached_item_count(), 3);
    }

    #[test]
    fn test_reuse_cached_items() {
        let mut list = RenderList::new();
        fill(&mut list, 5);
        list.reset();
        list.reuse_cached_items();
        assert_eq!(list.count(), 5);
        // Cached contents survive the reset/reuse cycle.
        assert_eq!(list.get_item(4).depth_index, 4);
    }
}
