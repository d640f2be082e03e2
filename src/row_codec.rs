// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The fixed-width raw row record format shared by `latest_records` and
//! the per-shard append streams (spec.md §6): `vin[17]` (only for
//! `latest_records`) `| timestamp:i64_le | ` one payload per schema
//! column, in schema order: `i32_le`, `f64_le`, or `u32_le length +
//! bytes`.

use crate::coding::corrupt;
use crate::error::{Error, Result};
use crate::schema::TableSchema;
use crate::value::{ColumnValue, Row, Vin};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Writes `row`'s timestamp and column payloads, in schema order.
/// Does not write the VIN prefix — callers that need it (the
/// `latest_records` file) write it separately.
pub fn write_row_body<W: Write>(writer: &mut W, schema: &TableSchema, row: &Row) -> Result<()> {
    writer.write_i64::<LittleEndian>(row.timestamp)?;
    for column in schema.columns() {
        let value = row
            .columns
            .get(&column.name)
            .ok_or_else(|| Error::InvalidSchema(format!("row missing column {}", column.name)))?;
        match value {
            ColumnValue::Int32(v) => writer.write_i32::<LittleEndian>(*v)?,
            ColumnValue::Float64(v) => writer.write_f64::<LittleEndian>(*v)?,
            ColumnValue::Bytes(v) => {
                writer.write_u32::<LittleEndian>(v.len() as u32)?;
                writer.write_all(v)?;
            }
        }
    }
    Ok(())
}

/// Reads one row body (as written by [`write_row_body`]) for a known
/// `vin`. Returns `Ok(None)` on a clean end-of-stream (no bytes read at
/// all); any other short read is reported as [`Error::Corruption`].
pub fn read_row_body<R: Read>(reader: &mut R, schema: &TableSchema, vin: Vin) -> Result<Option<Row>> {
    let mut first = [0u8; 8];
    let n = read_fill(reader, &mut first)?;
    if n == 0 {
        return Ok(None);
    }
    if n != 8 {
        return corrupt("row record: truncated timestamp");
    }
    let timestamp = i64::from_le_bytes(first);

    let mut row = Row::new(vin, timestamp);
    for column in schema.columns() {
        let value = match column.ty {
            crate::value::ColumnType::Int32 => ColumnValue::Int32(reader.read_i32::<LittleEndian>()?),
            crate::value::ColumnType::Float64 => ColumnValue::Float64(reader.read_f64::<LittleEndian>()?),
            crate::value::ColumnType::Bytes => {
                let len = reader.read_u32::<LittleEndian>()? as usize;
                let mut buf = vec![0u8; len];
                reader.read_exact(&mut buf)?;
                ColumnValue::Bytes(buf)
            }
        };
        row.columns.insert(column.name.clone(), value);
    }
    Ok(Some(row))
}

/// Writes a `latest_records` entry: the 17-byte VIN followed by the row
/// body. `row` may be `None` for a VIN slot never written, in which case
/// a zeroed record (timestamp `0`, default-valued columns) is emitted.
pub fn write_latest_record<W: Write>(writer: &mut W, schema: &TableSchema, vin: &Vin, row: Option<&Row>) -> Result<()> {
    writer.write_all(vin.as_bytes())?;
    match row {
        Some(row) => write_row_body(writer, schema, row),
        None => {
            let empty = Row::new(*vin, 0);
            let mut empty = empty;
            for column in schema.columns() {
                let default = match column.ty {
                    crate::value::ColumnType::Int32 => ColumnValue::Int32(0),
                    crate::value::ColumnType::Float64 => ColumnValue::Float64(0.0),
                    crate::value::ColumnType::Bytes => ColumnValue::Bytes(Vec::new()),
                };
                empty.columns.insert(column.name.clone(), default);
            }
            write_row_body(writer, schema, &empty)
        }
    }
}

/// Reads one `latest_records` entry (17-byte VIN prefix + row body).
pub fn read_latest_record<R: Read>(reader: &mut R, schema: &TableSchema) -> Result<Option<(Vin, Row)>> {
    let mut vin_bytes = [0u8; 17];
    let n = read_fill(reader, &mut vin_bytes)?;
    if n == 0 {
        return Ok(None);
    }
    if n != 17 {
        return corrupt("latest_records: truncated vin");
    }
    let vin = Vin(vin_bytes);
    let row = read_row_body(reader, schema, vin)?.ok_or_else(|| Error::Corruption("latest_records: missing row body".to_string()))?;
    Ok(Some((vin, row)))
}

fn read_fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDef;
    use crate::value::ColumnType;

    fn schema() -> TableSchema {
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

    #[test]
    fn row_body_round_trips() {
        let schema = schema();
        let vin = Vin::from_slice(b"vin");
        let mut row = Row::new(vin, 123);
        row.columns.insert("c1".into(), ColumnValue::Int32(7));
        row.columns.insert("c2".into(), ColumnValue::Float64(3.5));
        row.columns.insert("c3".into(), ColumnValue::Bytes(vec![1, 2, 3]));

        let mut buf = Vec::new();
        write_row_body(&mut buf, &schema, &row).unwrap();
        let decoded = read_row_body(&mut buf.as_slice(), &schema, vin).unwrap().unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn row_body_clean_eof_returns_none() {
        let schema = schema();
        let mut empty: &[u8] = &[];
        assert!(read_row_body(&mut empty, &schema, Vin::from_slice(b"x")).unwrap().is_none());
    }

    #[test]
    fn latest_record_round_trips() {
        let schema = schema();
        let vin = Vin::from_slice(b"vin-latest");
        let mut row = Row::new(vin, 42);
        row.columns.insert("c1".into(), ColumnValue::Int32(1));
        row.columns.insert("c2".into(), ColumnValue::Float64(2.0));
        row.columns.insert("c3".into(), ColumnValue::Bytes(vec![9, 9]));

        let mut buf = Vec::new();
        write_latest_record(&mut buf, &schema, &vin, Some(&row)).unwrap();
        let (decoded_vin, decoded_row) = read_latest_record(&mut buf.as_slice(), &schema).unwrap().unwrap();
        assert_eq!(decoded_vin, vin);
        assert_eq!(decoded_row, row);
    }

    #[test]
    fn latest_record_empty_slot_has_zero_timestamp() {
        let schema = schema();
        let vin = Vin::from_slice(b"never-written");
        let mut buf = Vec::new();
        write_latest_record(&mut buf, &schema, &vin, None).unwrap();
        let (_, row) = read_latest_record(&mut buf.as_slice(), &schema).unwrap().unwrap();
        assert_eq!(row.timestamp, 0);
    }
}
