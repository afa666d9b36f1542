//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Header parsing error.
    #[error("header error: {0}")]
    Envi(#[from] hyspexrad_envi::Error),

    /// Calibration error.
    #[error("calibration error: {0}")]
    Cal(#[from] hyspexrad_cal::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] hyspexrad_core::Error),

    /// Sidecar serialization error.
    #[error("sidecar error: {0}")]
    Json(#[from] serde_json::Error),
}
