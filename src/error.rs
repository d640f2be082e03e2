// Copyright (c) 2024-present, vints contributors
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::fmt;

/// Errors that can occur while operating the engine.
#[derive(Debug)]
pub enum Error {
    /// A table or on-disk file was not found.
    NotFound(String),

    /// `createTable` was called with a name that already exists.
    Duplicate(String),

    /// A schema was malformed: unknown type id, or a row's columns did not
    /// match the declared schema.
    InvalidSchema(String),

    /// A codec stream was malformed (short read, bad control bits, bad
    /// checksum).
    Corruption(String),

    /// Underlying filesystem operation failed.
    Io(std::io::Error),

    /// The engine was used while not connected, or after `shutdown`.
    State(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Duplicate(msg) => write!(f, "duplicate: {msg}"),
            Self::InvalidSchema(msg) => write!(f, "invalid schema: {msg}"),
            Self::Corruption(msg) => write!(f, "corruption: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::State(msg) => write!(f, "invalid state: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Engine result type.
pub type Result<T> = std::result::Result<T, Error>;
