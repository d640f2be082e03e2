// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Uniform (de)serialization traits for on-disk structures: the schema
//! file, the segment header/footer, and the `latest_records` snapshot.

use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Trait for types that serialize into a byte stream.
pub trait Encode {
    /// Serializes into the given writer.
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<()>;

    /// Serializes into a freshly allocated vector.
    fn encode_into_vec(&self) -> Vec<u8> {
        let mut v = vec![];
        self.encode_into(&mut v).expect("writing to a Vec cannot fail");
        v
    }
}

/// Trait for types that deserialize from a byte stream.
pub trait Decode: Sized {
    /// Deserializes from the given reader.
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self>;
}

/// Convenience: turn a short read into a [`Error::Corruption`] rather than
/// bubbling up an opaque I/O error.
pub(crate) fn corrupt<T>(what: &'static str) -> Result<T> {
    Err(Error::Corruption(what.to_string()))
}
