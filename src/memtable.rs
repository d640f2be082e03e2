// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An arena-backed, in-memory buffer of rows for one shard, flushed to an
//! immutable segment file once it grows past a size threshold (spec.md
//! §4.8).

use crate::skiplist::{Hint, SkipList};
use crate::value::{Row, Vin};

/// Arena-backed buffer of rows keyed by `(vin, timestamp)`, sorted for
/// eventual conversion into a segment [`crate::segment::writer`] block.
pub struct MemTable {
    entries: SkipList<(Vin, i64), Row>,
}

impl MemTable {
    /// Creates an empty memtable.
    pub fn new() -> Self {
        Self {
            entries: SkipList::new(),
        }
    }

    /// Number of rows currently buffered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the memtable has no buffered rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `row`. The skiplist itself never deduplicates (it does not
    /// support duplicate insertion, per [`crate::skiplist`]'s contract),
    /// so a repeated `(vin, timestamp)` key produces a second node spliced
    /// in immediately *before* the earlier one — [`MemTable::flush`]
    /// relies on that ordering to keep only the most recent write.
    pub fn insert(&mut self, row: Row) {
        let key = (row.vin, row.timestamp);
        let mut hint = Hint::default();
        self.entries.find(&key, &mut hint);
        self.entries.insert_with_hint(key, row, &mut hint);
    }

    /// Drains the memtable into a `Vec<Row>` sorted by `(vin, timestamp)`,
    /// ready to hand to [`crate::segment::writer::write_segment`]. For a
    /// repeated key, the most recently inserted row wins: since a later
    /// `insert` always splices its node in just before any earlier node of
    /// the same key (see [`MemTable::insert`]), the first row encountered
    /// in ascending iteration for a given key is the newest one.
    pub fn flush(&mut self) -> Vec<Row> {
        let mut last_key: Option<(Vin, i64)> = None;
        let mut rows = Vec::with_capacity(self.entries.len());
        for (key, row) in self.entries.iter() {
            if last_key == Some(*key) {
                continue;
            }
            rows.push(row.clone());
            last_key = Some(*key);
        }
        self.entries = SkipList::new();
        rows
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(vin: &str, ts: i64, marker: i32) -> Row {
        let mut row = Row::new(Vin::from_slice(vin.as_bytes()), ts);
        row.columns = BTreeMap::new();
        row.columns.insert("marker".to_string(), crate::value::ColumnValue::Int32(marker));
        row
    }

    #[test]
    fn flush_returns_rows_sorted_by_key() {
        let mut mt = MemTable::new();
        mt.insert(row("b", 5, 1));
        mt.insert(row("a", 10, 2));
        mt.insert(row("a", 1, 3));

        let flushed = mt.flush();
        let keys: Vec<_> = flushed.iter().map(|r| (r.vin, r.timestamp)).collect();
        assert_eq!(
            keys,
            vec![
                (Vin::from_slice(b"a"), 1),
                (Vin::from_slice(b"a"), 10),
                (Vin::from_slice(b"b"), 5),
            ]
        );
        assert!(mt.is_empty());
    }

    #[test]
    fn duplicate_key_last_writer_wins() {
        let mut mt = MemTable::new();
        mt.insert(row("a", 1, 100));
        mt.insert(row("a", 1, 200));

        let flushed = mt.flush();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].columns.get("marker"), Some(&crate::value::ColumnValue::Int32(200)));
    }
}
