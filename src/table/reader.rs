// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Serves latest-row and time-range queries for one table (spec.md
//! §4.10).

use super::LatestRows;
use crate::descriptor_table::DescriptorTable;
use crate::error::Result;
use crate::row_codec::read_row_body;
use crate::schema::TableSchema;
use crate::sharding::{bucket, shard_path, vin_num, VIN_TIME_RANGE_WIDTH};
use crate::value::{Row, Vin};
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

const MAX_BUCKET: i64 = 3_600;

/// A [`Read`] adapter over positioned reads (`pread`), so concurrent
/// queries against the same cached file handle don't race on a shared
/// cursor the way sequential `Read` on a cloned `File` would.
struct PositionedCursor<'a> {
    file: &'a File,
    pos: u64,
}

impl Read for PositionedCursor<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            let n = self.file.read_at(buf, self.pos)?;
            self.pos += n as u64;
            Ok(n)
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let n = self.file.seek_read(buf, self.pos)?;
            self.pos += n as u64;
            Ok(n)
        }
        #[cfg(not(any(unix, windows)))]
        {
            compile_error!("unsupported OS");
        }
    }
}

/// Reads latest rows straight out of the shared [`LatestRows`] table and
/// streams per-bucket shard files for time-range queries.
pub struct TableReader {
    root: PathBuf,
    schema: Arc<TableSchema>,
    latest: Arc<LatestRows>,
    descriptors: Arc<DescriptorTable>,
}

impl TableReader {
    pub(crate) fn new(root: PathBuf, schema: Arc<TableSchema>, latest: Arc<LatestRows>, descriptors: Arc<DescriptorTable>) -> Self {
        Self {
            root,
            schema,
            latest,
            descriptors,
        }
    }

    /// Returns the row with the greatest timestamp ever observed for
    /// `vin`, or `None` if nothing has been written for it.
    pub fn latest(&self, vin: Vin) -> Option<Row> {
        self.latest.get(vin_num(&vin) as usize)
    }

    /// Returns every row of `vin` whose timestamp lies in the half-open
    /// range `[lower, upper)`, projected to `requested_columns` (all
    /// columns if empty).
    pub fn time_range(&self, vin: Vin, lower: i64, upper: i64, requested_columns: &[String]) -> Result<Vec<Row>> {
        if lower >= upper {
            return Ok(Vec::new());
        }

        let start_bucket = bucket(lower).clamp(0, MAX_BUCKET - 1);
        // A row's timestamp can be at most `VIN_TIME_RANGE_WIDTH - 1` below
        // `upper` and still land in the range, so the last bucket that can
        // possibly hold a qualifying row is the one just below `upper`.
        let end_bucket = bucket(upper - 1).clamp(0, MAX_BUCKET - 1);
        if start_bucket > end_bucket {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for b in start_bucket..=end_bucket {
            self.scan_bucket(vin, b, lower, upper, requested_columns, &mut out)?;
        }
        Ok(out)
    }

    fn scan_bucket(&self, vin: Vin, bucket: i64, lower: i64, upper: i64, requested_columns: &[String], out: &mut Vec<Row>) -> Result<()> {
        let path = shard_path(&self.root, &vin, bucket);
        let file = match self.descriptors.access(&path) {
            Some(file) => file,
            None => {
                let file = match File::open(&path) {
                    Ok(f) => Arc::new(f),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                    Err(e) => return Err(e.into()),
                };
                self.descriptors.insert(path, file.clone());
                file
            }
        };

        let mut cursor = PositionedCursor { file: &file, pos: 0 };
        while let Some(row) = read_row_body(&mut cursor, &self.schema, vin)? {
            if row.timestamp >= lower && row.timestamp < upper {
                out.push(if requested_columns.is_empty() {
                    row
                } else {
                    row.project(requested_columns)
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;
    use crate::table::writer::TableWriter;
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

    fn setup() -> (tempfile::TempDir, TableWriter, TableReader) {
        let dir = tempdir().unwrap();
        let schema = schema();
        let latest = Arc::new(LatestRows::new(crate::sharding::VIN_RANGE_LENGTH as usize));
        let descriptors = Arc::new(DescriptorTable::new(16));
        let writer = TableWriter::new(dir.path().to_path_buf(), schema.clone(), latest.clone());
        let reader = TableReader::new(dir.path().to_path_buf(), schema, latest, descriptors);
        (dir, writer, reader)
    }

    #[test]
    fn latest_reflects_most_recent_write() {
        let (_dir, writer, reader) = setup();
        let vin = Vin::from_slice(b"VIN-A");
        writer.append(row(b"VIN-A", 10, 1)).unwrap();
        writer.append(row(b"VIN-A", 30, 3)).unwrap();
        writer.append(row(b"VIN-A", 20, 2)).unwrap();
        assert_eq!(reader.latest(vin).unwrap().timestamp, 30);
    }

    #[test]
    fn unseen_vin_has_no_latest_row() {
        let (_dir, _writer, reader) = setup();
        assert!(reader.latest(Vin::from_slice(b"ghost")).is_none());
    }

    #[test]
    fn time_range_is_half_open() {
        let (_dir, writer, reader) = setup();
        let vin = Vin::from_slice(b"VIN-B");
        for ts in [0, 10, 20, 30] {
            writer.append(row(b"VIN-B", ts, ts as i32)).unwrap();
        }
        let rows = reader.time_range(vin, 10, 30, &[]).unwrap();
        let timestamps: Vec<_> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20]);
    }

    #[test]
    fn time_range_empty_when_lower_equals_upper() {
        let (_dir, writer, reader) = setup();
        let vin = Vin::from_slice(b"VIN-C");
        writer.append(row(b"VIN-C", 5, 1)).unwrap();
        assert!(reader.time_range(vin, 5, 5, &[]).unwrap().is_empty());
    }

    #[test]
    fn time_range_spans_multiple_buckets() {
        let (_dir, writer, reader) = setup();
        let vin = Vin::from_slice(b"VIN-D");
        writer.append(row(b"VIN-D", 10, 1)).unwrap();
        writer.append(row(b"VIN-D", VIN_TIME_RANGE_WIDTH + 10, 2)).unwrap();
        let rows = reader.time_range(vin, 0, VIN_TIME_RANGE_WIDTH + 20, &[]).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn time_range_projects_requested_columns() {
        let (_dir, writer, reader) = setup();
        let vin = Vin::from_slice(b"VIN-E");
        writer.append(row(b"VIN-E", 1, 42)).unwrap();
        let rows = reader.time_range(vin, 0, 10, &["speed".to_string()]).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].columns.contains_key("speed"));
    }

    #[test]
    fn time_range_for_unknown_vin_is_empty() {
        let (_dir, _writer, reader) = setup();
        let rows = reader.time_range(Vin::from_slice(b"never"), 0, 100, &[]).unwrap();
        assert!(rows.is_empty());
    }
}
