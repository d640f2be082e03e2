// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The row/column data model shared by every layer of the engine.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// A 17-byte vehicle identifier, used as the major component of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Vin(pub [u8; 17]);

impl Vin {
    /// Builds a VIN from a byte slice, padding with zeros or truncating to
    /// fit the fixed 17-byte width.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 17];
        let n = bytes.len().min(17);
        buf[..n].copy_from_slice(&bytes[..n]);
        Self(buf)
    }

    /// The raw 17 bytes.
    pub fn as_bytes(&self) -> &[u8; 17] {
        &self.0
    }
}

impl Borrow<[u8]> for Vin {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Vin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

/// The wire type id of a column, matching spec.md §6's on-disk encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnType {
    Int32 = 0,
    Float64 = 1,
    Bytes = 2,
}

impl ColumnType {
    /// Parses a wire type id, failing on anything but `0`/`1`/`2`.
    pub fn from_wire(id: u8) -> crate::error::Result<Self> {
        match id {
            0 => Ok(Self::Int32),
            1 => Ok(Self::Float64),
            2 => Ok(Self::Bytes),
            other => Err(crate::error::Error::InvalidSchema(format!("unknown column type id {other}"))),
        }
    }
}

/// A single column's value, tagged by [`ColumnType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int32(i32),
    Float64(f64),
    Bytes(Vec<u8>),
}

impl ColumnValue {
    /// The type tag of this value.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Int32(_) => ColumnType::Int32,
            Self::Float64(_) => ColumnType::Float64,
            Self::Bytes(_) => ColumnType::Bytes,
        }
    }
}

/// A single row: a VIN, a timestamp, and its columns in schema order.
///
/// Columns are kept in a `BTreeMap` rather than a `Vec` so that iteration
/// order is deterministic (by column name) independent of insertion order,
/// which both the `latest_records` writer and tests rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub vin: Vin,
    pub timestamp: i64,
    pub columns: BTreeMap<String, ColumnValue>,
}

impl Row {
    /// Creates a row with no columns set.
    pub fn new(vin: Vin, timestamp: i64) -> Self {
        Self {
            vin,
            timestamp,
            columns: BTreeMap::new(),
        }
    }

    /// Projects this row down to only the requested column names. Missing
    /// columns are silently skipped; the result is still ordered by column
    /// name, since `columns` is a `BTreeMap`.
    pub fn project(&self, requested: &[String]) -> Row {
        let mut out = Row::new(self.vin, self.timestamp);
        for name in requested {
            if let Some(value) = self.columns.get(name) {
                out.columns.insert(name.clone(), value.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vin_from_slice_pads_and_truncates() {
        let short = Vin::from_slice(b"abc");
        assert_eq!(&short.0[..3], b"abc");
        assert_eq!(&short.0[3..], &[0u8; 14]);

        let long = Vin::from_slice(b"012345678901234567890");
        assert_eq!(long.0.len(), 17);
        assert_eq!(&long.0, b"01234567890123456");
    }

    #[test]
    fn vin_ordering_is_lexicographic() {
        let a = Vin::from_slice(b"a");
        let b = Vin::from_slice(b"b");
        assert!(a < b);
    }

    #[test]
    fn column_type_round_trips_wire_ids() {
        assert_eq!(ColumnType::from_wire(0).unwrap(), ColumnType::Int32);
        assert_eq!(ColumnType::from_wire(1).unwrap(), ColumnType::Float64);
        assert_eq!(ColumnType::from_wire(2).unwrap(), ColumnType::Bytes);
        assert!(ColumnType::from_wire(3).is_err());
    }

    #[test]
    fn project_keeps_only_requested_columns_in_order() {
        let mut row = Row::new(Vin::from_slice(b"vin"), 10);
        row.columns.insert("c1".into(), ColumnValue::Int32(1));
        row.columns.insert("c2".into(), ColumnValue::Float64(2.0));
        let projected = row.project(&["c2".to_string(), "missing".to_string()]);
        assert_eq!(projected.columns.len(), 1);
        assert!(projected.columns.contains_key("c2"));
    }
}
