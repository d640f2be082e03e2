// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Routes appended rows to per-`(vin_num, bucket)` shard streams and
//! maintains the shared latest-row table (spec.md §4.9).

use super::LatestRows;
use crate::error::Result;
use crate::row_codec::{write_latest_record, write_row_body};
use crate::schema::TableSchema;
use crate::sharding::{bucket, shard_path, vin_num};
use crate::value::{Row, Vin};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Owns the open append streams for one table and updates the shared
/// [`LatestRows`] table on every row it writes.
///
/// Per spec.md §4.9/§5, each `(vin_num, bucket)` shard has its own stream
/// lock (`append_mutexes[·]`), so concurrent appends to different shards
/// never block each other. The outer `streams` lock only guards the
/// lookup/insert of a shard's entry; the per-shard `Mutex<BufWriter<File>>`
/// guards the actual write.
pub struct TableWriter {
    root: PathBuf,
    schema: Arc<TableSchema>,
    latest: Arc<LatestRows>,
    streams: Mutex<HashMap<PathBuf, Arc<Mutex<BufWriter<File>>>>>,
}

impl TableWriter {
    pub(crate) fn new(root: PathBuf, schema: Arc<TableSchema>, latest: Arc<LatestRows>) -> Self {
        Self {
            root,
            schema,
            latest,
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Appends `row` to its shard stream and, if it is the newest row
    /// seen for its VIN, updates the latest-row table.
    ///
    /// Per spec.md §4.9: the latest-row update and the append happen
    /// under separate locks, in that order — a reader can briefly observe
    /// the updated latest row before the append is durable, but never the
    /// other way around. The append itself is serialized only against
    /// other writers of the *same* shard; a concurrent append to a
    /// different `(vin_num, bucket)` shard holds a different inner lock.
    pub fn append(&self, row: Row) -> Result<()> {
        let slot = vin_num(&row.vin) as usize;
        self.latest.maybe_update(slot, &row);

        let path = shard_path(&self.root, &row.vin, bucket(row.timestamp));
        let stream = self.stream_for(&path)?;
        let mut writer = stream.lock().expect("shard stream lock poisoned");
        write_row_body(&mut *writer, &self.schema, &row)?;
        writer.flush()?;
        Ok(())
    }

    /// Looks up (or opens and inserts) the shard stream for `path`. The
    /// global `streams` lock is held only for this lookup/insert, never
    /// for the write itself.
    fn stream_for(&self, path: &Path) -> Result<Arc<Mutex<BufWriter<File>>>> {
        let mut streams = self.streams.lock().expect("append streams lock poisoned");
        if let Some(stream) = streams.get(path) {
            return Ok(stream.clone());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let stream = Arc::new(Mutex::new(BufWriter::new(file)));
        streams.insert(path.to_path_buf(), stream.clone());
        Ok(stream)
    }

    /// Persists the full `latest_records` snapshot: exactly `len()` fixed-
    /// width records, one per `vin_num` slot, unwritten slots encoded as
    /// an all-zero VIN with a zeroed row body (spec.md §6).
    pub fn persist_latest(&self, path: &Path) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        for slot in 0..self.latest.len() {
            match self.latest.get(slot) {
                Some(row) => write_latest_record(&mut file, &self.schema, &row.vin, Some(&row))?,
                None => write_latest_record(&mut file, &self.schema, &Vin([0u8; 17]), None)?,
            }
        }
        file.flush()?;
        file.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(())
    }

    /// Restores a `latest_records` snapshot written by
    /// [`TableWriter::persist_latest`]. A missing file is treated as an
    /// empty table (e.g. first-ever `connect`).
    pub fn restore_latest(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let mut file = BufReader::new(File::open(path)?);
        for slot in 0..self.latest.len() {
            let Some((vin, row)) = crate::row_codec::read_latest_record(&mut file, &self.schema)? else {
                break;
            };
            if vin.as_bytes() == &[0u8; 17] {
                continue;
            }
            self.latest.set(slot, row);
        }
        Ok(())
    }

    /// Flushes and drops every open append stream. Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut streams = self.streams.lock().expect("append streams lock poisoned");
        for stream in streams.values() {
            stream.lock().expect("shard stream lock poisoned").flush()?;
        }
        streams.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;
    use crate::value::ColumnType;
    use tempfile::tempdir;

    fn schema() -> Arc<TableSchema> {
        Arc::new(TableSchema::new(vec![ColumnDef {
            name: "speed".into(),
            ty: ColumnType::Int32,
        }]))
    }

    fn row(vin: &[u8], ts: i64, speed: i32) -> Row {
        let mut row = Row::new(Vin::from_slice(vin), ts);
        row.columns.insert("speed".into(), crate::value::ColumnValue::Int32(speed));
        row
    }

    #[test]
    fn append_updates_latest_only_when_newer() {
        let dir = tempdir().unwrap();
        let schema = schema();
        let latest = Arc::new(LatestRows::new(crate::sharding::VIN_RANGE_LENGTH as usize));
        let writer = TableWriter::new(dir.path().to_path_buf(), schema, latest.clone());

        writer.append(row(b"VIN1", 100, 1)).unwrap();
        writer.append(row(b"VIN1", 50, 2)).unwrap();

        let slot = vin_num(&Vin::from_slice(b"VIN1")) as usize;
        assert_eq!(latest.get(slot).unwrap().timestamp, 100);
    }

    #[test]
    fn append_creates_shard_file_on_disk() {
        let dir = tempdir().unwrap();
        let schema = schema();
        let latest = Arc::new(LatestRows::new(crate::sharding::VIN_RANGE_LENGTH as usize));
        let writer = TableWriter::new(dir.path().to_path_buf(), schema, latest);

        let r = row(b"VIN2", 7_300, 9);
        writer.append(r.clone()).unwrap();
        writer.close().unwrap();

        let path = shard_path(dir.path(), &r.vin, bucket(r.timestamp));
        assert!(path.exists());
    }

    #[test]
    fn persist_then_restore_latest_round_trips() {
        let dir = tempdir().unwrap();
        let schema = schema();
        let latest_a = Arc::new(LatestRows::new(crate::sharding::VIN_RANGE_LENGTH as usize));
        let writer_a = TableWriter::new(dir.path().to_path_buf(), schema.clone(), latest_a);

        writer_a.append(row(b"VIN3", 1, 3)).unwrap();
        writer_a.append(row(b"VIN4", 2, 4)).unwrap();
        let snapshot = dir.path().join("latest_records");
        writer_a.persist_latest(&snapshot).unwrap();

        let latest_b = Arc::new(LatestRows::new(crate::sharding::VIN_RANGE_LENGTH as usize));
        let writer_b = TableWriter::new(dir.path().to_path_buf(), schema, latest_b.clone());
        writer_b.restore_latest(&snapshot).unwrap();

        let slot3 = vin_num(&Vin::from_slice(b"VIN3")) as usize;
        assert_eq!(latest_b.get(slot3).unwrap().timestamp, 1);
    }

    #[test]
    fn concurrent_appends_to_different_shards_all_land() {
        let dir = tempdir().unwrap();
        let schema = schema();
        let latest = Arc::new(LatestRows::new(crate::sharding::VIN_RANGE_LENGTH as usize));
        let writer = Arc::new(TableWriter::new(dir.path().to_path_buf(), schema, latest));

        std::thread::scope(|s| {
            for i in 0..8 {
                let writer = writer.clone();
                s.spawn(move || {
                    let vin = format!("VIN-shard-{i}");
                    for ts in 0..20 {
                        writer.append(row(vin.as_bytes(), ts, i)).unwrap();
                    }
                });
            }
        });

        for i in 0..8 {
            let vin = Vin::from_slice(format!("VIN-shard-{i}").as_bytes());
            let slot = vin_num(&vin) as usize;
            assert_eq!(writer.latest.get(slot).unwrap().timestamp, 19);
        }
    }
}
