// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Per-column compression codecs: Gorilla/Chimp for floats, Simple-8b/RLE
//! for integers (spec.md §4.4/§4.5).

pub mod float_chimp;
pub mod float_gorilla;
pub mod int_rle;
pub mod int_simple8b;

/// Which codec a column block was written with, persisted in the segment
/// footer (spec.md §6) so the reader never has to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CodecId {
    GorillaFloat = 0,
    ChimpFloat = 1,
    Simple8bInt = 2,
    RleInt = 3,
    /// `Bytes` columns are stored length-prefixed and uncompressed.
    RawBytes = 4,
}

impl CodecId {
    pub fn from_wire(id: u8) -> crate::error::Result<Self> {
        match id {
            0 => Ok(Self::GorillaFloat),
            1 => Ok(Self::ChimpFloat),
            2 => Ok(Self::Simple8bInt),
            3 => Ok(Self::RleInt),
            4 => Ok(Self::RawBytes),
            other => Err(crate::error::Error::Corruption(format!("unknown codec id {other}"))),
        }
    }
}

/// Ratio of distinct to total values below which [`int_rle`] is preferred
/// over [`int_simple8b`] for an integer column (an implementation
/// decision recorded in DESIGN.md; spec.md leaves the choice open).
pub const RLE_PREFERENCE_THRESHOLD: f64 = 0.1;

/// Picks and runs the best integer codec for `values`, returning the
/// chosen codec id alongside its encoded bytes.
pub fn encode_ints(values: &[i32]) -> (CodecId, Vec<u8>) {
    if int_rle::distinct_ratio_under(values, RLE_PREFERENCE_THRESHOLD) {
        (CodecId::RleInt, int_rle::encode(values))
    } else {
        (CodecId::Simple8bInt, int_simple8b::encode(values))
    }
}

/// Decodes an integer column block given its codec id.
pub fn decode_ints(codec: CodecId, data: &[u8]) -> crate::error::Result<Vec<i32>> {
    match codec {
        CodecId::Simple8bInt => int_simple8b::decode(data),
        CodecId::RleInt => int_rle::decode(data),
        other => Err(crate::error::Error::Corruption(format!("{other:?} is not an integer codec"))),
    }
}

/// Decodes a float column block given its codec id.
pub fn decode_floats(codec: CodecId, data: &[u8]) -> crate::error::Result<Vec<f64>> {
    match codec {
        CodecId::GorillaFloat => float_gorilla::decode(data),
        CodecId::ChimpFloat => float_chimp::decode(data),
        other => Err(crate::error::Error::Corruption(format!("{other:?} is not a float codec"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_ints_prefers_rle_for_repetitive_columns() {
        let values = vec![9; 200];
        let (codec, _) = encode_ints(&values);
        assert_eq!(codec, CodecId::RleInt);
    }

    #[test]
    fn encode_ints_prefers_simple8b_for_varied_columns() {
        let values: Vec<i32> = (0..200).collect();
        let (codec, _) = encode_ints(&values);
        assert_eq!(codec, CodecId::Simple8bInt);
    }

    #[test]
    fn codec_id_round_trips_wire_ids() {
        for id in [0u8, 1, 2, 3, 4] {
            assert!(CodecId::from_wire(id).is_ok());
        }
        assert!(CodecId::from_wire(5).is_err());
    }
}
