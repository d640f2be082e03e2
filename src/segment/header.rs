// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The fixed segment header: a magic, the row count, and a schema digest
//! the reader checks against its own schema before trusting the file
//! (spec.md §4.6/§6).

use crate::coding::{corrupt, Decode, Encode};
use crate::error::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub const MAGIC: [u8; 4] = *b"VTS1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub row_count: u32,
    pub schema_digest: u32,
}

impl Encode for SegmentHeader {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u32::<LittleEndian>(self.row_count)?;
        writer.write_u32::<LittleEndian>(self.schema_digest)?;
        Ok(())
    }
}

impl Decode for SegmentHeader {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return corrupt("segment header: bad magic");
        }
        let row_count = reader.read_u32::<LittleEndian>()?;
        let schema_digest = reader.read_u32::<LittleEndian>()?;
        Ok(Self { row_count, schema_digest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let header = SegmentHeader {
            row_count: 42,
            schema_digest: 0xDEAD_BEEF,
        };
        let bytes = header.encode_into_vec();
        let decoded = SegmentHeader::decode_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0u8; 12];
        assert!(SegmentHeader::decode_from(&mut bytes.as_slice()).is_err());
    }
}
