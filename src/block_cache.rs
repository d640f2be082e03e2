// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Caches a segment's fully decoded rows so repeated time-range scans
//! against the same `(vin_num, bucket)` segment don't re-read and
//! re-decompress it from disk (spec.md §4.7, SPEC_FULL.md §4.17).

use crate::value::Row;
use quick_cache::sync::Cache;
use quick_cache::Weighter;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
struct RowsWeighter;

impl Weighter<PathBuf, Arc<Vec<Row>>> for RowsWeighter {
    fn weight(&self, _: &PathBuf, rows: &Arc<Vec<Row>>) -> u64 {
        // A rough per-row footprint estimate (17-byte VIN + 8-byte
        // timestamp + a handful of column values); exactness doesn't
        // matter, only that the weight scales with what's actually cached.
        (rows.len() as u64 * 64).max(1)
    }
}

/// An in-memory cache of fully decoded segment contents, keyed by segment
/// file path.
pub struct BlockCache {
    data: Cache<PathBuf, Arc<Vec<Row>>, RowsWeighter, rustc_hash::FxBuildHasher>,
    capacity: u64,
}

impl BlockCache {
    /// Creates a cache with roughly `bytes` of capacity.
    #[must_use]
    pub fn with_capacity_bytes(bytes: u64) -> Self {
        #[allow(clippy::default_trait_access)]
        let cache = Cache::with(1_000, bytes, RowsWeighter, Default::default(), quick_cache::sync::DefaultLifecycle::default());
        Self { data: cache, capacity: bytes }
    }

    /// The cache's configured capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of cached segments.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is currently cached.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Looks up a previously decoded segment's rows.
    pub fn get(&self, path: &PathBuf) -> Option<Arc<Vec<Row>>> {
        self.data.get(path)
    }

    /// Caches `rows` decoded from the segment at `path`. A no-op when the
    /// cache capacity is zero.
    pub fn insert(&self, path: PathBuf, rows: Arc<Vec<Row>>) {
        if self.capacity > 0 {
            self.data.insert(path, rows);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Vin;

    #[test]
    fn insert_then_get_round_trips() {
        let cache = BlockCache::with_capacity_bytes(1024 * 1024);
        let path = PathBuf::from("/tmp/seg-1");
        let rows = Arc::new(vec![Row::new(Vin::from_slice(b"abc"), 1)]);
        cache.insert(path.clone(), rows.clone());
        assert_eq!(cache.get(&path).unwrap().len(), rows.len());
    }

    #[test]
    fn zero_capacity_cache_never_stores_anything() {
        let cache = BlockCache::with_capacity_bytes(0);
        let path = PathBuf::from("/tmp/seg-1");
        cache.insert(path.clone(), Arc::new(vec![Row::new(Vin::from_slice(b"abc"), 1)]));
        assert!(cache.get(&path).is_none());
    }
}
