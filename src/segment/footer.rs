// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The segment footer: one block descriptor per column (VIN block,
//! timestamp block, then each schema column in order), followed by a
//! 4-byte backward offset to the footer's own start — the file's last
//! four bytes (spec.md §4.6/§6).

use crate::coding::{Decode, Encode};
use crate::codec::CodecId;
use crate::error::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub offset: u32,
    pub comp_size: u32,
    pub uncomp_size: u32,
    pub codec: CodecId,
}

impl Encode for BlockDescriptor {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.comp_size)?;
        writer.write_u32::<LittleEndian>(self.uncomp_size)?;
        writer.write_u8(self.codec as u8)?;
        Ok(())
    }
}

impl Decode for BlockDescriptor {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self> {
        let offset = reader.read_u32::<LittleEndian>()?;
        let comp_size = reader.read_u32::<LittleEndian>()?;
        let uncomp_size = reader.read_u32::<LittleEndian>()?;
        let codec = CodecId::from_wire(reader.read_u8()?)?;
        Ok(Self {
            offset,
            comp_size,
            uncomp_size,
            codec,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFooter {
    /// Block descriptors in on-disk order: VIN block, timestamp block,
    /// then one per schema column.
    pub blocks: Vec<BlockDescriptor>,
}

impl Encode for SegmentFooter {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<()> {
        for block in &self.blocks {
            block.encode_into(writer)?;
        }
        Ok(())
    }
}

impl SegmentFooter {
    /// Decodes `count` block descriptors from `reader`.
    pub fn decode_with_count<R: Read>(reader: &mut R, count: usize) -> Result<Self> {
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            blocks.push(BlockDescriptor::decode_from(reader)?);
        }
        Ok(Self { blocks })
    }
}
