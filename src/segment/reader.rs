// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Reads an immutable segment file written by [`crate::segment::writer`]
//! (spec.md §4.7).
//!
//! Column blocks are decompressed eagerly into an in-memory `Vec<Row>` at
//! open time rather than streamed group-by-group: segments in this engine
//! are bounded by a single flush's worth of rows, so the simpler
//! eager-materialize approach is equivalent in observable behavior while
//! being far less code. `next_batch`/cursor semantics are layered on top
//! of that materialized vector. [`SegmentReader::open_cached`] consults a
//! [`BlockCache`] before decompressing, since that eager decode is where
//! this reader's decompression work actually happens.

use crate::block_cache::BlockCache;
use crate::codec::{self, CodecId};
use crate::coding::{corrupt, Decode};
use crate::error::{Error, Result};
use crate::schema::TableSchema;
use crate::segment::footer::SegmentFooter;
use crate::segment::header::SegmentHeader;
use crate::value::{ColumnValue, Row, Vin};
use byteorder::{LittleEndian, ReadBytesExt};
use std::path::Path;
use std::sync::Arc;

/// An opened, fully materialized segment.
pub struct SegmentReader {
    rows: Vec<Row>,
    cursor: usize,
}

impl SegmentReader {
    /// Opens and fully decodes the segment file at `path`.
    pub fn open(path: &Path, schema: &TableSchema) -> Result<Self> {
        let rows = decode_segment_file(path, schema)?;
        Ok(Self { rows, cursor: 0 })
    }

    /// Opens the segment at `path`, consulting `cache` before decompressing
    /// its column blocks. Segments are immutable once written, so a cache
    /// hit is trusted without re-checking the schema digest; a miss decodes
    /// normally and populates the cache for the next open of the same path.
    pub fn open_cached(path: &Path, schema: &TableSchema, cache: &BlockCache) -> Result<Self> {
        let path_key = path.to_path_buf();
        if let Some(rows) = cache.get(&path_key) {
            return Ok(Self { rows: (*rows).clone(), cursor: 0 });
        }
        let rows = decode_segment_file(path, schema)?;
        cache.insert(path_key, Arc::new(rows.clone()));
        Ok(Self { rows, cursor: 0 })
    }

    /// Total rows in this segment.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Positions the cursor at the first row.
    pub fn seek_to_first(&mut self) {
        self.cursor = 0;
    }

    /// Positions the cursor at row `n`.
    pub fn seek_to_ordinal(&mut self, n: usize) {
        self.cursor = n.min(self.rows.len());
    }

    /// Materializes up to `count` rows starting at the cursor, advancing
    /// it by the number actually returned.
    pub fn next_batch(&mut self, count: usize) -> Vec<Row> {
        let end = (self.cursor + count).min(self.rows.len());
        let batch = self.rows[self.cursor..end].to_vec();
        self.cursor = end;
        batch
    }

    /// The row with the greatest timestamp for `vin`, if any is present.
    pub fn handle_latest_query(&self, vin: &Vin) -> Option<Row> {
        self.rows.iter().filter(|r| &r.vin == vin).max_by_key(|r| r.timestamp).cloned()
    }

    /// Every row for `vin` whose timestamp lies in `[lo, hi)`.
    pub fn handle_time_range_query(&self, vin: &Vin, lo: i64, hi: i64) -> Vec<Row> {
        self.rows
            .iter()
            .filter(|r| &r.vin == vin && r.timestamp >= lo && r.timestamp < hi)
            .cloned()
            .collect()
    }
}

/// Reads and fully decodes the segment file at `path` into its rows,
/// without consulting a [`BlockCache`].
fn decode_segment_file(path: &Path, schema: &TableSchema) -> Result<Vec<Row>> {
    let data = std::fs::read(path)?;
    if data.len() < 12 + 4 {
        return corrupt("segment file too small");
    }

    let header = SegmentHeader::decode_from(&mut &data[..12])?;
    if header.schema_digest != schema.digest() {
        return Err(Error::InvalidSchema("segment schema digest does not match table schema".to_string()));
    }

    let footer_start = u32::from_le_bytes(data[data.len() - 4..].try_into().unwrap()) as usize;
    if footer_start > data.len() - 4 {
        return corrupt("segment footer offset out of range");
    }
    let footer_block_count = schema.len() + 2;
    let footer = SegmentFooter::decode_with_count(&mut &data[footer_start..data.len() - 4], footer_block_count)?;

    let row_count = header.row_count as usize;
    let body = &data[12..footer_start];

    let vin_block = &footer.blocks[0];
    let ts_block = &footer.blocks[1];
    let vins = decode_vins(slice_block(body, vin_block)?, row_count)?;
    let timestamps = decode_timestamps(slice_block(body, ts_block)?, row_count)?;

    let mut columns: Vec<(String, Vec<ColumnValue>)> = Vec::with_capacity(schema.len());
    for (column, block) in schema.columns().iter().zip(footer.blocks.iter().skip(2)) {
        let raw = slice_block(body, block)?;
        let values = decode_column(column, block.codec, raw, row_count)?;
        columns.push((column.name.clone(), values));
    }

    let mut rows = Vec::with_capacity(row_count);
    for i in 0..row_count {
        let mut row = Row::new(vins[i], timestamps[i]);
        for (name, values) in &columns {
            row.columns.insert(name.clone(), values[i].clone());
        }
        rows.push(row);
    }
    Ok(rows)
}

fn slice_block<'a>(body: &'a [u8], block: &crate::segment::footer::BlockDescriptor) -> Result<&'a [u8]> {
    let start = block.offset as usize;
    let end = start + block.comp_size as usize;
    body.get(start..end).ok_or_else(|| Error::Corruption("segment block out of range".to_string()))
}

fn decode_vins(raw: &[u8], row_count: usize) -> Result<Vec<Vin>> {
    if raw.len() != row_count * 17 {
        return corrupt("segment vin block: size mismatch");
    }
    Ok(raw.chunks_exact(17).map(|c| Vin::from_slice(c)).collect())
}

fn decode_timestamps(mut raw: &[u8], row_count: usize) -> Result<Vec<i64>> {
    if raw.len() != row_count * 8 {
        return corrupt("segment timestamp block: size mismatch");
    }
    let mut out = Vec::with_capacity(row_count);
    for _ in 0..row_count {
        out.push(raw.read_i64::<LittleEndian>()?);
    }
    Ok(out)
}

fn decode_column(
    column: &crate::schema::ColumnDef,
    codec: CodecId,
    raw: &[u8],
    row_count: usize,
) -> Result<Vec<ColumnValue>> {
    match column.ty {
        crate::value::ColumnType::Int32 => {
            let values = codec::decode_ints(codec, raw)?;
            if values.len() != row_count {
                return corrupt("segment int column: row count mismatch");
            }
            Ok(values.into_iter().map(ColumnValue::Int32).collect())
        }
        crate::value::ColumnType::Float64 => {
            let values = codec::decode_floats(codec, raw)?;
            if values.len() != row_count {
                return corrupt("segment float column: row count mismatch");
            }
            Ok(values.into_iter().map(ColumnValue::Float64).collect())
        }
        crate::value::ColumnType::Bytes => {
            let mut out = Vec::with_capacity(row_count);
            let mut cursor = raw;
            for _ in 0..row_count {
                let len = cursor.read_u32::<LittleEndian>()? as usize;
                if cursor.len() < len {
                    return corrupt("segment bytes column: truncated value");
                }
                out.push(ColumnValue::Bytes(cursor[..len].to_vec()));
                cursor = &cursor[len..];
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;
    use crate::segment::writer::write_segment;
    use crate::value::ColumnType;
    use tempfile::tempdir;

    fn sample_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef {
                name: "c1".into(),
                ty: ColumnType::Int32,
            },
            ColumnDef {
                name: "c2".into(),
                ty: ColumnType::Float64,
            },
            ColumnDef {
                name: "c3".into(),
                ty: ColumnType::Bytes,
            },
        ])
    }

    fn sample_rows(schema: &TableSchema) -> Vec<Row> {
        let mut rows = Vec::new();
        for i in 0..20 {
            let mut row = Row::new(Vin::from_slice(format!("vin-{}", i % 3).as_bytes()), i as i64 * 10);
            for col in schema.columns() {
                let value = match col.ty {
                    ColumnType::Int32 => ColumnValue::Int32(i),
                    ColumnType::Float64 => ColumnValue::Float64(i as f64 * 1.5),
                    ColumnType::Bytes => ColumnValue::Bytes(vec![i as u8; (i % 5) as usize]),
                };
                row.columns.insert(col.name.clone(), value);
            }
            rows.push(row);
        }
        rows.sort_by(|a, b| (a.vin, a.timestamp).cmp(&(b.vin, b.timestamp)));
        rows
    }

    #[test]
    fn round_trips_rows_through_segment_file() {
        let schema = sample_schema();
        let rows = sample_rows(&schema);
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");
        write_segment(&path, &schema, &rows).unwrap();

        let mut reader = SegmentReader::open(&path, &schema).unwrap();
        assert_eq!(reader.row_count(), rows.len());
        reader.seek_to_first();
        let batch = reader.next_batch(rows.len());
        assert_eq!(batch, rows);
    }

    #[test]
    fn latest_query_returns_greatest_timestamp() {
        let schema = sample_schema();
        let rows = sample_rows(&schema);
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");
        write_segment(&path, &schema, &rows).unwrap();

        let reader = SegmentReader::open(&path, &schema).unwrap();
        let vin = Vin::from_slice(b"vin-0");
        let latest = reader.handle_latest_query(&vin).unwrap();
        let expected = rows.iter().filter(|r| r.vin == vin).max_by_key(|r| r.timestamp).unwrap();
        assert_eq!(&latest, expected);
    }

    #[test]
    fn time_range_query_is_half_open() {
        let schema = sample_schema();
        let rows = sample_rows(&schema);
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");
        write_segment(&path, &schema, &rows).unwrap();

        let reader = SegmentReader::open(&path, &schema).unwrap();
        let vin = Vin::from_slice(b"vin-1");
        let results = reader.handle_time_range_query(&vin, 10, 10);
        assert!(results.is_empty());
    }

    #[test]
    fn rejects_schema_digest_mismatch() {
        let schema = sample_schema();
        let rows = sample_rows(&schema);
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");
        write_segment(&path, &schema, &rows).unwrap();

        let other_schema = TableSchema::new(vec![ColumnDef {
            name: "different".into(),
            ty: ColumnType::Int32,
        }]);
        assert!(SegmentReader::open(&path, &other_schema).is_err());
    }

    #[test]
    fn open_cached_populates_and_then_hits_the_cache() {
        let schema = sample_schema();
        let rows = sample_rows(&schema);
        let dir = tempdir().unwrap();
        let path = dir.path().join("segment.bin");
        write_segment(&path, &schema, &rows).unwrap();

        let cache = crate::block_cache::BlockCache::with_capacity_bytes(1024 * 1024);
        assert!(cache.is_empty());

        let mut first = SegmentReader::open_cached(&path, &schema, &cache).unwrap();
        assert_eq!(first.next_batch(rows.len()), rows);
        assert_eq!(cache.len(), 1);

        // Delete the on-disk file: a second open_cached can only succeed if
        // it actually served the previous decode from the cache.
        std::fs::remove_file(&path).unwrap();
        let mut second = SegmentReader::open_cached(&path, &schema, &cache).unwrap();
        assert_eq!(second.next_batch(rows.len()), rows);
    }
}
