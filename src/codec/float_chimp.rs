// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Chimp-128: a grouped variant of the Gorilla scheme (spec.md §4.4, C4')
//! tuned for streams with long runs of small trailing-zero counts.
//!
//! Values are partitioned into groups of up to [`GROUP_SIZE`]. Each group
//! writes a 2-bit flag per value (identical / reuse-window / new-window),
//! a 3-bit leading-zero-table index for "new-window" values (indexing
//! [`LEADING_ZERO_TABLE`]), and an inline 16-bit trailing/ data-bit-count
//! pair for new-window values whose window spans more than the table's
//! representable leading-zero counts would otherwise force. A 4-byte
//! backward offset to the first group's start is written at the stream's
//! tail so a reader positioned anywhere past the data can locate it.

use crate::bitstream::{BitReader, BitWriter};
use crate::coding::corrupt;
use crate::error::Result;

const GROUP_SIZE: usize = 1024;

/// Candidate leading-zero counts a "new-window" control packs into 3 bits.
const LEADING_ZERO_TABLE: [u32; 16] = [0, 8, 12, 16, 18, 20, 22, 24, 26, 28, 30, 32, 34, 36, 40, 48];

fn leading_zero_index(leading: u32) -> (u8, u32) {
    let mut best_idx = 0u8;
    let mut best_val = LEADING_ZERO_TABLE[0];
    for (idx, &candidate) in LEADING_ZERO_TABLE.iter().enumerate() {
        if candidate <= leading && candidate >= best_val {
            best_idx = idx as u8;
            best_val = candidate;
        }
    }
    (best_idx, best_val)
}

/// Compresses `values` using the Chimp-128 grouped scheme.
pub fn encode(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());

    let mut group_offsets = Vec::new();
    for group in values.chunks(GROUP_SIZE) {
        group_offsets.push(out.len() as u32);
        out.extend(encode_group(group));
    }

    let first_group_offset = group_offsets.first().copied().unwrap_or(out.len() as u32);
    out.extend_from_slice(&first_group_offset.to_le_bytes());
    out
}

fn encode_group(values: &[f64]) -> Vec<u8> {
    let mut writer = BitWriter::new();
    writer.write_bits(16, values.len() as u64);

    let mut prev_bits = 0u64;
    let mut prev_leading = 64u32;
    let mut prev_data_bits = 0u32;

    for (i, &value) in values.iter().enumerate() {
        let bits = value.to_bits();
        if i == 0 {
            writer.write_bits(64, bits);
            prev_bits = bits;
            continue;
        }

        let xor = bits ^ prev_bits;
        if xor == 0 {
            writer.write_bits(2, 0b00);
        } else {
            let leading = xor.leading_zeros();
            let trailing = xor.trailing_zeros();
            let data_bits = 64 - leading - trailing;

            if leading >= prev_leading && data_bits <= prev_data_bits && prev_data_bits > 0 {
                writer.write_bits(2, 0b01);
                let shift = 64 - prev_leading - prev_data_bits;
                let window = (xor >> shift) & mask(prev_data_bits);
                writer.write_bits(prev_data_bits as u8, window);
            } else {
                writer.write_bits(2, 0b10);
                let (idx, table_leading) = leading_zero_index(leading);
                writer.write_bits(3, idx as u64);
                writer.write_bits(16, (data_bits as u64) << 8 | (table_leading as u64 & 0xFF));
                let shift = 64 - table_leading - data_bits;
                let window = (xor >> shift) & mask(data_bits);
                writer.write_bits(data_bits as u8, window);
                prev_leading = table_leading;
                prev_data_bits = data_bits;
            }
        }
        prev_bits = bits;
    }

    writer.finish()
}

fn mask(bits: u32) -> u64 {
    if bits == 0 {
        0
    } else if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Decompresses a Chimp-128 byte stream produced by [`encode`].
pub fn decode(data: &[u8]) -> Result<Vec<f64>> {
    if data.len() < 8 {
        return corrupt("chimp stream truncated before header");
    }
    let total_count = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    let first_group_offset = u32::from_le_bytes(data[data.len() - 4..].try_into().unwrap()) as usize;
    if first_group_offset > data.len() - 4 {
        return corrupt("chimp stream: backward offset out of range");
    }

    let mut out = Vec::with_capacity(total_count);
    let mut cursor = first_group_offset;
    while out.len() < total_count {
        let group_bytes = &data[cursor..data.len() - 4];
        let (group_values, consumed) = decode_group(group_bytes)?;
        out.extend(group_values);
        cursor += consumed;
    }
    Ok(out)
}

fn decode_group(data: &[u8]) -> Result<(Vec<f64>, usize)> {
    let mut reader = BitReader::new(data);
    let count = reader.read_bits(16)? as usize;
    if count == 0 {
        return Ok((Vec::new(), (reader.count() as usize).div_ceil(8)));
    }

    let mut out = Vec::with_capacity(count);
    let mut prev_bits = reader.read_bits(64)?;
    out.push(f64::from_bits(prev_bits));

    let mut prev_leading = 64u32;
    let mut prev_data_bits = 0u32;

    for _ in 1..count {
        let flag = reader.read_bits(2)?;
        let bits = match flag {
            0b00 => prev_bits,
            0b01 => {
                let shift = 64 - prev_leading - prev_data_bits;
                let window = reader.read_bits(prev_data_bits as u8)?;
                prev_bits ^ (window << shift)
            }
            0b10 => {
                let idx = reader.read_bits(3)? as usize;
                let packed = reader.read_bits(16)?;
                let data_bits = (packed >> 8) as u32;
                let table_leading = LEADING_ZERO_TABLE[idx];
                debug_assert_eq!(table_leading as u64 & 0xFF, packed & 0xFF);
                if data_bits == 0 && table_leading == 0 {
                    return corrupt("chimp stream: fatal all-zero new-window control");
                }
                let shift = 64 - table_leading - data_bits;
                let window = reader.read_bits(data_bits as u8)?;
                prev_leading = table_leading;
                prev_data_bits = data_bits;
                prev_bits ^ (window << shift)
            }
            _ => return corrupt("chimp stream: impossible 2-bit flag"),
        };
        out.push(f64::from_bits(bits));
        prev_bits = bits;
    }

    let consumed_bytes = (reader.count() as usize).div_ceil(8);
    Ok((out, consumed_bytes))
}
