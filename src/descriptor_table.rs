// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Caches open segment file handles, bounding `ulimit` pressure when many
//! `(vin_num, bucket)` shard segments exist on disk (SPEC_FULL.md §4.16).

use quick_cache::sync::Cache as QuickCache;
use quick_cache::UnitWeighter;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

/// Caches open file handles keyed by their path, evicting the
/// least-recently-used handle once `capacity` is exceeded.
pub struct DescriptorTable {
    inner: QuickCache<PathBuf, Arc<File>, UnitWeighter, rustc_hash::FxBuildHasher>,
}

impl DescriptorTable {
    /// Creates a table holding up to `capacity` open handles.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        #[allow(clippy::default_trait_access)]
        let quick_cache = QuickCache::with(
            1_000,
            capacity as u64,
            UnitWeighter,
            Default::default(),
            quick_cache::sync::DefaultLifecycle::default(),
        );
        Self { inner: quick_cache }
    }

    /// Returns a cached handle for `path`, if one is open.
    #[must_use]
    pub fn access(&self, path: &PathBuf) -> Option<Arc<File>> {
        self.inner.get(path)
    }

    /// Caches `file` under `path`, potentially evicting another handle.
    pub fn insert(&self, path: PathBuf, file: Arc<File>) {
        self.inner.insert(path, file);
    }

    /// Drops all cached handles.
    pub fn clear(&self) {
        self.inner.clear();
    }
}
