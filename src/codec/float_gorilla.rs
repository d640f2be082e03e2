// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Gorilla XOR-delta compression for `f64` columns (spec.md §4.4).
//!
//! Each value after the first is encoded against its predecessor's XOR:
//! `0b0` for an identical value, `0b10` to reuse the previous
//! leading/trailing-zero window, `0b11` to emit a fresh window. Values are
//! always 8 bytes wide here (`Float64` is the only floating column type),
//! so the header's `bytes_to_skip` padding is always zero; it is still
//! written so the format matches a multi-width Gorilla stream byte for
//! byte.

use crate::bitstream::{BitReader, BitWriter};
use crate::coding::corrupt;
use crate::error::Result;

const DATA_BYTES_SIZE: u8 = 8;
/// `D = ceil(log2(64)) + 1`, `L = D - 1`, per spec.md §4.4.
const LEADING_ZERO_BITS: u8 = 6;
const DATA_BIT_COUNT_BITS: u8 = 7;

/// Compresses `values` into a Gorilla XOR-delta byte stream.
pub fn encode(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(DATA_BYTES_SIZE);
    let bytes_to_skip = (values.len() * 8) % DATA_BYTES_SIZE as usize;
    out.push(bytes_to_skip as u8);
    out.resize(out.len() + bytes_to_skip, 0);

    let mut writer = BitWriter::new();
    writer.write_bits(32, values.len() as u64);

    let mut prev_bits = 0u64;
    let mut prev_leading = 64u32;
    let mut prev_trailing = 0u32;

    for (i, &value) in values.iter().enumerate() {
        let bits = value.to_bits();
        if i == 0 {
            writer.write_bits(64, bits);
            prev_bits = bits;
            continue;
        }

        let xor = bits ^ prev_bits;
        if xor == 0 {
            writer.write_bits(1, 0b0);
        } else {
            let leading = xor.leading_zeros();
            let trailing = xor.trailing_zeros();
            if leading >= prev_leading && trailing >= prev_trailing && prev_leading + prev_trailing > 0 {
                writer.write_bits(2, 0b10);
                let data_bits = 64 - prev_leading - prev_trailing;
                let window = (xor >> prev_trailing) & mask(data_bits);
                writer.write_bits(data_bits as u8, window);
            } else {
                writer.write_bits(2, 0b11);
                writer.write_bits(LEADING_ZERO_BITS, leading as u64);
                let data_bits = 64 - leading - trailing;
                writer.write_bits(DATA_BIT_COUNT_BITS, data_bits as u64);
                let window = (xor >> trailing) & mask(data_bits);
                writer.write_bits(data_bits as u8, window);
                prev_leading = leading;
                prev_trailing = trailing;
            }
        }
        prev_bits = bits;
    }

    out.extend(writer.finish());
    out
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

/// Decompresses a Gorilla XOR-delta byte stream produced by [`encode`].
pub fn decode(data: &[u8]) -> Result<Vec<f64>> {
    if data.len() < 2 {
        return corrupt("gorilla stream truncated before header");
    }
    let data_bytes_size = data[0];
    let bytes_to_skip = data[1] as usize;
    if data_bytes_size != DATA_BYTES_SIZE {
        return corrupt("gorilla stream: unsupported data width");
    }
    let payload = &data[2 + bytes_to_skip..];

    let mut reader = BitReader::new(payload);
    let count = reader.read_bits(32)? as usize;
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(count);
    let mut prev_bits = reader.read_bits(64)?;
    out.push(f64::from_bits(prev_bits));

    let mut prev_leading = 64u32;
    let mut prev_trailing = 0u32;

    for _ in 1..count {
        let bits = if reader.read_bit()? {
            if reader.read_bit()? {
                // 0b11: fresh window
                let leading = reader.read_bits(LEADING_ZERO_BITS)? as u32;
                let data_bits = reader.read_bits(DATA_BIT_COUNT_BITS)? as u32;
                if leading == 0 && data_bits == 0 {
                    return corrupt("gorilla stream: fatal all-zero 0b11 control");
                }
                let trailing = 64 - leading - data_bits;
                let window = reader.read_bits(data_bits as u8)?;
                prev_leading = leading;
                prev_trailing = trailing;
                prev_bits ^ (window << trailing)
            } else {
                // 0b10: reuse previous window
                let data_bits = 64 - prev_leading - prev_trailing;
                let window = reader.read_bits(data_bits as u8)?;
                prev_bits ^ (window << prev_trailing)
            }
        } else {
            prev_bits
        };
        out.push(f64::from_bits(bits));
        prev_bits = bits;
    }

    Ok(out)
}
