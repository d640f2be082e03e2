// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The write path (C9) and read path (C10) for one table, plus the
//! `latest_records` state they share (spec.md §4.9, §4.10).

mod reader;
mod writer;

pub use reader::TableReader;
pub use writer::TableWriter;

use crate::descriptor_table::DescriptorTable;
use crate::error::Result;
use crate::schema::TableSchema;
use crate::sharding::VIN_RANGE_LENGTH;
use crate::value::Row;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// The in-memory `LatestRecord[vin_num]` array (spec.md §3), shared
/// between [`TableWriter`] (which updates it on every append) and
/// [`TableReader`] (which serves latest queries straight out of it).
pub(crate) struct LatestRows {
    slots: Vec<RwLock<Option<Row>>>,
}

impl LatestRows {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| RwLock::new(None)).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn get(&self, slot: usize) -> Option<Row> {
        self.slots[slot].read().expect("latest row lock poisoned").clone()
    }

    /// Replaces the slot's row if `row` is newer, per the invariant
    /// `LatestRecord[v].timestamp == max { r.timestamp | r written for v }`.
    pub(crate) fn maybe_update(&self, slot: usize, row: &Row) {
        let mut guard = self.slots[slot].write().expect("latest row lock poisoned");
        let replace = match guard.as_ref() {
            Some(current) => row.timestamp > current.timestamp,
            None => true,
        };
        if replace {
            *guard = Some(row.clone());
        }
    }

    pub(crate) fn set(&self, slot: usize, row: Row) {
        *self.slots[slot].write().expect("latest row lock poisoned") = Some(row);
    }
}

/// One table's full storage surface: its schema, write path, and read
/// path, plus the `latest_records` state the last two share (spec.md
/// §3's Ownership note).
pub struct Table {
    pub(crate) schema: Arc<TableSchema>,
    pub(crate) writer: TableWriter,
    pub(crate) reader: Arc<TableReader>,
}

impl Table {
    /// Opens (or prepares to create) the table rooted at `root`.
    pub(crate) fn open(root: PathBuf, schema: Arc<TableSchema>, descriptors: Arc<DescriptorTable>) -> Self {
        let latest = Arc::new(LatestRows::new(VIN_RANGE_LENGTH as usize));
        let writer = TableWriter::new(root.clone(), schema.clone(), latest.clone());
        let reader = Arc::new(TableReader::new(root, schema.clone(), latest, descriptors));
        Self { schema, writer, reader }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn writer(&self) -> &TableWriter {
        &self.writer
    }

    /// An `Arc`-shared handle to this table's reader, cheap to clone into
    /// a `'static` closure (e.g. a thread-pool job).
    pub fn reader(&self) -> &Arc<TableReader> {
        &self.reader
    }

    /// Restores the `latest_records` snapshot at `path`, if it exists.
    pub fn restore_latest(&self, path: &Path) -> Result<()> {
        self.writer.restore_latest(path)
    }

    /// Persists the `latest_records` snapshot to `path`.
    pub fn persist_latest(&self, path: &Path) -> Result<()> {
        self.writer.persist_latest(path)
    }

    /// Flushes and closes every open append stream.
    pub fn close(&self) -> Result<()> {
        self.writer.close()
    }
}
