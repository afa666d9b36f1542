//! Calibration and quantization error types.

use thiserror::Error;

/// Result type for calibration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Calibration and quantization error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Input array shapes do not agree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The binary header's calibration-availability flag is unset.
    #[error("binary header carries no usable calibration data")]
    CalibrationUnavailable,

    /// Quantizer scale factor must be finite and positive.
    #[error("invalid scale factor: {0}")]
    InvalidScale(f64),

    /// Quantizer sub-chunk length must be nonzero.
    #[error("invalid sub-chunk length: {0}")]
    InvalidSubChunk(usize),

    /// Header parsing error.
    #[error("header error: {0}")]
    Envi(#[from] hyspexrad_envi::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] hyspexrad_core::Error),
}
