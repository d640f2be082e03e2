// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Writes an immutable, columnar segment file from a sorted batch of rows
//! (spec.md §4.6).

use crate::coding::Encode;
use crate::codec::{self, CodecId};
use crate::error::{Error, Result};
use crate::schema::TableSchema;
use crate::segment::footer::{BlockDescriptor, SegmentFooter};
use crate::segment::header::SegmentHeader;
use crate::value::{ColumnValue, Row};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use std::path::Path;

/// Writes `rows` (already sorted ascending by `(vin, timestamp)`) to
/// `path` as a single immutable segment file, per `schema`.
pub fn write_segment(path: &Path, schema: &TableSchema, rows: &[Row]) -> Result<()> {
    let mut body = Vec::new();
    let mut blocks = Vec::with_capacity(schema.len() + 2);

    // VIN block: 17 raw bytes per row.
    let vin_uncomp = rows.len() * 17;
    let offset = body.len() as u32;
    for row in rows {
        body.extend_from_slice(row.vin.as_bytes());
    }
    blocks.push(BlockDescriptor {
        offset,
        comp_size: vin_uncomp as u32,
        uncomp_size: vin_uncomp as u32,
        codec: CodecId::RawBytes,
    });

    // Timestamp block: raw little-endian i64 per row.
    let ts_uncomp = rows.len() * 8;
    let offset = body.len() as u32;
    for row in rows {
        body.write_i64::<LittleEndian>(row.timestamp)?;
    }
    blocks.push(BlockDescriptor {
        offset,
        comp_size: ts_uncomp as u32,
        uncomp_size: ts_uncomp as u32,
        codec: CodecId::RawBytes,
    });

    for column in schema.columns() {
        let offset = body.len() as u32;
        let (codec, encoded, uncomp_size) = encode_column(column, rows)?;
        body.extend_from_slice(&encoded);
        blocks.push(BlockDescriptor {
            offset,
            comp_size: encoded.len() as u32,
            uncomp_size: uncomp_size as u32,
            codec,
        });
    }

    let header = SegmentHeader {
        row_count: rows.len() as u32,
        schema_digest: schema.digest(),
    };

    let mut file_bytes = Vec::new();
    header.encode_into(&mut file_bytes)?;
    file_bytes.extend(body);

    let footer_start = file_bytes.len() as u32;
    let footer = SegmentFooter { blocks };
    footer.encode_into(&mut file_bytes)?;
    file_bytes.write_u32::<LittleEndian>(footer_start)?;

    let mut file = std::fs::File::create(path)?;
    file.write_all(&file_bytes)?;
    file.sync_all()?;
    Ok(())
}

fn encode_column(column: &crate::schema::ColumnDef, rows: &[Row]) -> Result<(CodecId, Vec<u8>, usize)> {
    match column.ty {
        crate::value::ColumnType::Int32 => {
            let values = extract_i32(column, rows)?;
            let uncomp = values.len() * 4;
            let (codec, encoded) = codec::encode_ints(&values);
            Ok((codec, encoded, uncomp))
        }
        crate::value::ColumnType::Float64 => {
            let values = extract_f64(column, rows)?;
            let uncomp = values.len() * 8;
            let encoded = codec::float_gorilla::encode(&values);
            Ok((CodecId::GorillaFloat, encoded, uncomp))
        }
        crate::value::ColumnType::Bytes => {
            let mut out = Vec::new();
            let mut uncomp = 0usize;
            for row in rows {
                let bytes = extract_bytes(column, row)?;
                uncomp += bytes.len();
                out.write_u32::<LittleEndian>(bytes.len() as u32)?;
                out.extend_from_slice(bytes);
            }
            Ok((CodecId::RawBytes, out, uncomp))
        }
    }
}

fn extract_i32(column: &crate::schema::ColumnDef, rows: &[Row]) -> Result<Vec<i32>> {
    rows.iter()
        .map(|row| match row.columns.get(&column.name) {
            Some(ColumnValue::Int32(v)) => Ok(*v),
            Some(_) => Err(Error::InvalidSchema(format!("column {} is not Int32", column.name))),
            None => Err(Error::InvalidSchema(format!("row missing column {}", column.name))),
        })
        .collect()
}

fn extract_f64(column: &crate::schema::ColumnDef, rows: &[Row]) -> Result<Vec<f64>> {
    rows.iter()
        .map(|row| match row.columns.get(&column.name) {
            Some(ColumnValue::Float64(v)) => Ok(*v),
            Some(_) => Err(Error::InvalidSchema(format!("column {} is not Float64", column.name))),
            None => Err(Error::InvalidSchema(format!("row missing column {}", column.name))),
        })
        .collect()
}

fn extract_bytes<'a>(column: &crate::schema::ColumnDef, row: &'a Row) -> Result<&'a [u8]> {
    match row.columns.get(&column.name) {
        Some(ColumnValue::Bytes(v)) => Ok(v.as_slice()),
        Some(_) => Err(Error::InvalidSchema(format!("column {} is not Bytes", column.name))),
        None => Err(Error::InvalidSchema(format!("row missing column {}", column.name))),
    }
}
