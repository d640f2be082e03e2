// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Run-length encoding for highly repetitive integer columns (spec.md
//! §4.5): a sequence of `(value: i64, run_length: u64)` pairs.

use crate::coding::corrupt;
use crate::error::Result;

/// Compresses `values` as `(value, run_length)` pairs.
pub fn encode(values: &[i32]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());

    let mut i = 0;
    while i < values.len() {
        let value = values[i];
        let mut run = 1u64;
        while i + (run as usize) < values.len() && values[i + run as usize] == value {
            run += 1;
        }
        out.extend_from_slice(&(value as i64).to_le_bytes());
        out.extend_from_slice(&run.to_le_bytes());
        i += run as usize;
    }
    out
}

/// Decompresses a stream produced by [`encode`].
pub fn decode(data: &[u8]) -> Result<Vec<i32>> {
    if data.len() < 4 {
        return corrupt("rle stream truncated before header");
    }
    let count = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    let mut out = Vec::with_capacity(count);

    let mut offset = 4;
    while out.len() < count {
        if offset + 16 > data.len() {
            return corrupt("rle stream: truncated run record");
        }
        let value = i64::from_le_bytes(data[offset..offset + 8].try_into().unwrap());
        let run = u64::from_le_bytes(data[offset + 8..offset + 16].try_into().unwrap());
        offset += 16;

        if value < i32::MIN as i64 || value > i32::MAX as i64 {
            return corrupt("rle stream: value out of i32 range");
        }
        for _ in 0..run {
            out.push(value as i32);
        }
    }
    Ok(out)
}

/// A cheap heuristic for whether RLE is likely to beat Simple-8b: the
/// ratio of distinct values to total values falls under `threshold`.
pub fn distinct_ratio_under(values: &[i32], threshold: f64) -> bool {
    if values.is_empty() {
        return false;
    }
    let mut distinct = rustc_hash::FxHashSet::default();
    for &v in values {
        distinct.insert(v);
    }
    (distinct.len() as f64) / (values.len() as f64) < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_runs() {
        let values = vec![1, 1, 1, 2, 2, 3, 3, 3, 3];
        let encoded = encode(&values);
        assert_eq!(decode(&encoded).unwrap(), values);
    }

    #[test]
    fn round_trips_no_repeats() {
        let values: Vec<i32> = (0..50).collect();
        let encoded = encode(&values);
        assert_eq!(decode(&encoded).unwrap(), values);
    }

    #[test]
    fn round_trips_empty() {
        let encoded = encode(&[]);
        assert_eq!(decode(&encoded).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn distinct_ratio_detects_repetitive_columns() {
        let repetitive = vec![5; 100];
        let varied: Vec<i32> = (0..100).collect();
        assert!(distinct_ratio_under(&repetitive, 0.1));
        assert!(!distinct_ratio_under(&varied, 0.1));
    }
}
