// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Engine configuration builder, in the teacher's `Config` builder style.

use std::path::{Path, PathBuf};

const DEFAULT_THREAD_POOL_SIZE: usize = 8;
const DEFAULT_DESCRIPTOR_TABLE_CAPACITY: usize = 128;
const DEFAULT_BLOCK_CACHE_CAPACITY_BYTES: u64 = 16 * 1_024 * 1_024;
const DEFAULT_MEMTABLE_FLUSH_THRESHOLD: usize = 4_096;

/// Engine configuration, built via the fluent setters below.
#[derive(Clone)]
pub struct EngineConfig {
    /// Root directory the engine is rooted at.
    pub(crate) path: PathBuf,

    /// Number of worker threads backing [`crate::thread_pool::ThreadPool`].
    pub(crate) thread_pool_size: usize,

    /// Maximum number of open segment file handles kept warm by
    /// [`crate::descriptor_table::DescriptorTable`].
    pub(crate) descriptor_table_capacity: usize,

    /// Maximum bytes of decompressed column blocks kept by
    /// [`crate::block_cache::BlockCache`].
    pub(crate) block_cache_capacity_bytes: u64,

    /// Number of buffered rows in a shard's [`crate::memtable::MemTable`]
    /// before it is flushed into an immutable segment.
    pub(crate) memtable_flush_threshold: usize,
}

impl EngineConfig {
    /// Initializes a config rooted at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            thread_pool_size: DEFAULT_THREAD_POOL_SIZE,
            descriptor_table_capacity: DEFAULT_DESCRIPTOR_TABLE_CAPACITY,
            block_cache_capacity_bytes: DEFAULT_BLOCK_CACHE_CAPACITY_BYTES,
            memtable_flush_threshold: DEFAULT_MEMTABLE_FLUSH_THRESHOLD,
        }
    }

    /// Sets the number of worker threads used to parallelize latest
    /// queries.
    ///
    /// # Panics
    /// Panics if `n` is 0.
    #[must_use]
    pub fn thread_pool_size(mut self, n: usize) -> Self {
        assert!(n > 0, "thread pool size must be at least 1");
        self.thread_pool_size = n;
        self
    }

    /// Sets the maximum number of open segment file handles kept warm.
    #[must_use]
    pub fn descriptor_table_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "descriptor table capacity must be at least 1");
        self.descriptor_table_capacity = n;
        self
    }

    /// Sets the block cache's capacity in bytes.
    #[must_use]
    pub fn block_cache_capacity_bytes(mut self, bytes: u64) -> Self {
        self.block_cache_capacity_bytes = bytes;
        self
    }

    /// Sets how many rows a shard buffers before flushing to a segment.
    ///
    /// # Panics
    /// Panics if `n` is 0.
    #[must_use]
    pub fn memtable_flush_threshold(mut self, n: usize) -> Self {
        assert!(n > 0, "flush threshold must be at least 1");
        self.memtable_flush_threshold = n;
        self
    }

    /// The root directory this config points at.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::new("/tmp/db");
        assert_eq!(config.thread_pool_size, DEFAULT_THREAD_POOL_SIZE);
        assert_eq!(config.path(), Path::new("/tmp/db"));
    }

    #[test]
    fn builder_setters_chain() {
        let config = EngineConfig::new("/tmp/db").thread_pool_size(4).memtable_flush_threshold(10);
        assert_eq!(config.thread_pool_size, 4);
        assert_eq!(config.memtable_flush_threshold, 10);
    }

    #[test]
    #[should_panic]
    fn thread_pool_size_rejects_zero() {
        EngineConfig::new("/tmp/db").thread_pool_size(0);
    }
}
