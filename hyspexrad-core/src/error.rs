//! Error types for hyspexrad-core.

use thiserror::Error;

/// Result type alias for hyspexrad operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for hyspexrad operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unsupported structural input.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Pixel coordinate or line range outside the cube bounds.
    #[error("{axis} index {index} out of bounds (size {size})")]
    OutOfBounds {
        axis: &'static str,
        index: usize,
        size: usize,
    },

    /// ENVI dtype that cannot be read as raw counts.
    #[error("unsupported dtype: {0}")]
    UnsupportedDtype(String),

    /// Auto-scale quantizer found no suitable scale within the ceiling.
    #[error("no power-of-ten scale up to {max_scale} meets tolerance {tolerance}")]
    NoSuitableScale { max_scale: u32, tolerance: f64 },
}
