//! Pipeline Cache
//!
//! Maps a pipeline-factory hash to one or more candidate pipelines. The
//! common case is a bucket with exactly one entry, returned in O(1); hash
//! collisions fall back to a linear scan verifying full create-info
//! equality. Collision buckets are small vectors so the single-entry case
//! stays allocation-free.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::graphics::controller::{
    fx_hash_key, GraphicsController, PipelineCreateInfo, PipelineHandle,
};

struct Entry {
    info: PipelineCreateInfo,
    pipeline: PipelineHandle,
}

/// Hash → pipeline cache with explicit collision handling.
#[derive(Default)]
pub struct PipelineCache {
    lookup: FxHashMap<u64, SmallVec<[Entry; 1]>>,
    pipeline_count: usize,
}

impl PipelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached pipelines across all buckets.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipeline_count
    }

    /// Looks up a pipeline by factory hash.
    ///
    /// A single-entry bucket is returned immediately without comparing
    /// create-infos; multi-entry buckets are scanned for full equality so
    /// colliding configurations are never confused.
    #[must_use]
    pub fn get_pipeline(&self, hash: u64, info: &PipelineCreateInfo) -> Option<PipelineHandle> {
        let bucket = self.lookup.get(&hash)?;
        if bucket.len() == 1 {
            return Some(bucket[0].pipeline);
        }
        bucket
            .iter()
            .find(|entry| entry.info == *info)
            .map(|entry| entry.pipeline)
    }

    /// Stores a pipeline under the given hash. Always appends — callers
    /// are responsible for not double-inserting identical configurations.
    pub fn save_pipeline(&mut self, hash: u64, info: PipelineCreateInfo, pipeline: PipelineHandle) {
        self.lookup
            .entry(hash)
            .or_default()
            .push(Entry { info, pipeline });
        self.pipeline_count += 1;
    }

    /// Removes a pipeline from its bucket; removing the only entry clears
    /// the whole bucket.
    pub fn remove_pipeline(&mut self, hash: u64, pipeline: PipelineHandle) {
        let Some(bucket) = self.lookup.get_mut(&hash) else {
            return;
        };
        if let Some(position) = bucket.iter().position(|entry| entry.pipeline == pipeline) {
            bucket.remove(position);
            self.pipeline_count -= 1;
        }
        if bucket.is_empty() {
            self.lookup.remove(&hash);
        }
    }

    /// Lookup-or-create convenience used by the render manager: hashes the
    /// create-info, consults the cache, and builds the pipeline through the
    /// controller on a miss.
    pub fn get_or_create(
        &mut self,
        controller: &mut dyn GraphicsController,
        info: &PipelineCreateInfo,
    ) -> PipelineHandle {
        let hash = fx_hash_key(info);
        if let Some(pipeline) = self.get_pipeline(hash, info) {
            return pipeline;
        }
        let pipeline = controller.create_pipeline(info);
        self.save_pipeline(hash, info.clone(), pipeline);
        pipeline
    }

    /// Clears every cached pipeline (e.g. after sample-count or format
    /// changes invalidate all state objects).
    pub fn clear(&mut self) {
        self.lookup.clear();
        self.pipeline_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(sample_count: u32) -> PipelineCreateInfo {
        PipelineCreateInfo {
            sample_count,
            ..PipelineCreateInfo::default()
        }
    }

    #[test]
    fn test_save_then_get_returns_same_pipeline() {
        let mut cache = PipelineCache::new();
        let create_info = info(1);
        let hash = fx_hash_key(&create_info);
        cache.save_pipeline(hash, create_info.clone(), PipelineHandle(7));
        assert_eq!(
            cache.get_pipeline(hash, &create_info),
            Some(PipelineHandle(7))
        );
    }

    #[test]
    fn test_colliding_hash_returns_correct_entry() {
        let mut cache = PipelineCache::new();
        let first = info(1);
        let second = info(4);
        // Force a collision: both entries land in one bucket.
        let hash = 0xDEAD_BEEF;
        cache.save_pipeline(hash, first.clone(), PipelineHandle(1));
        cache.save_pipeline(hash, second.clone(), PipelineHandle(2));

        assert_eq!(cache.get_pipeline(hash, &first), Some(PipelineHandle(1)));
        assert_eq!(cache.get_pipeline(hash, &second), Some(PipelineHandle(2)));

        let third = info(8);
        assert_eq!(cache.get_pipeline(hash, &third), None);
    }

    #[test]
    fn test_remove_only_entry_clears_bucket() {
        let mut cache = PipelineCache::new();
        let create_info = info(1);
        let hash = fx_hash_key(&create_info);
        cache.save_pipeline(hash, create_info.clone(), PipelineHandle(3));
        cache.remove_pipeline(hash, PipelineHandle(3));

        assert_eq!(cache.pipeline_count(), 0);
        assert_eq!(cache.get_pipeline(hash, &create_info), None);
    }

    #[test]
    fn test_get_or_create_hits_cache() {
        let mut cache = PipelineCache::new();
        let mut controller = crate::graphics::NullGraphicsController::new();
        let create_info = info(1);

        let first = cache.get_or_create(&mut controller, &create_info);
        let second = cache.get_or_create(&mut controller, &create_info);
        assert_eq!(first, second);
        assert_eq!(controller.pipelines_created, 1);
    }
}
