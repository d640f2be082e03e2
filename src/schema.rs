// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The per-table column schema catalog: an ordered list of
//! `(name, type)` pairs, fixed at `createTable` time and persisted as a
//! small text file at the table root (spec.md §6).

use crate::error::{Error, Result};
use crate::value::ColumnType;
use std::io::{BufRead, Write};
use std::path::Path;

/// A single declared column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

/// The ordered column list for one table, fixed at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Builds a schema from an ordered list of `(name, type)` pairs.
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self { columns }
    }

    /// The declared columns, in schema order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Number of declared columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether this schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// A stable digest of the column list, used as the segment header's
    /// `schema_digest` to detect a schema/segment mismatch on read.
    pub fn digest(&self) -> u32 {
        let mut buf = Vec::new();
        for col in &self.columns {
            buf.extend_from_slice(col.name.as_bytes());
            buf.push(0);
            buf.push(col.ty as u8);
        }
        xxhash_rust::xxh3::xxh3_64(&buf) as u32
    }

    /// Persists the schema as `<n> <name_0> <type_0> <name_1> <type_1> …`.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        out.push_str(&self.columns.len().to_string());
        for col in &self.columns {
            out.push(' ');
            out.push_str(&col.name);
            out.push(' ');
            out.push_str(&(col.ty as u8).to_string());
        }
        let mut file = std::fs::File::create(path)?;
        file.write_all(out.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Restores a schema previously written by [`TableSchema::persist`].
    pub fn restore(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut line = String::new();
        std::io::BufReader::new(file).read_line(&mut line)?;
        let mut tokens = line.split_whitespace();

        let n: usize = tokens
            .next()
            .ok_or_else(|| Error::Corruption("empty schema file".to_string()))?
            .parse()
            .map_err(|_| Error::Corruption("schema file: bad column count".to_string()))?;

        let mut columns = Vec::with_capacity(n);
        for _ in 0..n {
            let name = tokens
                .next()
                .ok_or_else(|| Error::Corruption("schema file: missing column name".to_string()))?
                .to_string();
            let type_id: u8 = tokens
                .next()
                .ok_or_else(|| Error::Corruption("schema file: missing column type".to_string()))?
                .parse()
                .map_err(|_| Error::Corruption("schema file: bad column type".to_string()))?;
            columns.push(ColumnDef {
                name,
                ty: ColumnType::from_wire(type_id)?,
            });
        }
        Ok(Self { columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef {
                name: "t1c1".into(),
                ty: ColumnType::Int32,
            },
            ColumnDef {
                name: "t1c2".into(),
                ty: ColumnType::Float64,
            },
            ColumnDef {
                name: "t1c3".into(),
                ty: ColumnType::Bytes,
            },
        ])
    }

    #[test]
    fn persist_then_restore_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema");
        let schema = sample();
        schema.persist(&path).unwrap();
        let restored = TableSchema::restore(&path).unwrap();
        assert_eq!(schema, restored);
    }

    #[test]
    fn persisted_format_matches_text_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema");
        sample().persist(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "3 t1c1 0 t1c2 1 t1c3 2");
    }

    #[test]
    fn restore_rejects_unknown_type_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema");
        std::fs::write(&path, "1 c 9").unwrap();
        assert!(TableSchema::restore(&path).is_err());
    }

    #[test]
    fn digest_is_stable_and_order_sensitive() {
        let a = sample();
        let b = TableSchema::new(vec![a.columns()[1].clone(), a.columns()[0].clone(), a.columns()[2].clone()]);
        assert_eq!(a.digest(), a.digest());
        assert_ne!(a.digest(), b.digest());
    }
}
