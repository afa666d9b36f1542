//! Header-parsing error types.

use thiserror::Error;

/// Result type for header parsing.
pub type Result<T> = std::result::Result<T, Error>;

/// Header-parsing error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not start with the `ENVI` marker.
    #[error("not an ENVI header: {0}")]
    NotEnviHeader(String),

    /// Binary preamble magic word is not `HYSPEX`.
    #[error("unknown binary file format: magic word {0:?}")]
    BadMagic(String),

    /// Buffer ended before a declared field or array was complete.
    #[error("truncated binary header: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Malformed key/value structure.
    #[error("header parsing error: {0}")]
    ParseError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] hyspexrad_core::Error),
}
