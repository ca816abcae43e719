//! Shared building blocks for the update/render pipeline: the double-buffer
//! index plumbing and the fixed-size memory pool used for transient per-frame
//! allocations.

pub mod double_buffered;
pub mod memory_pool;

pub use double_buffered::{BufferIndex, DoubleBuffered, SceneGraphBuffers, DOUBLE_BUFFER_COUNT};
pub use memory_pool::{FixedSizePool, PoolIndex};
