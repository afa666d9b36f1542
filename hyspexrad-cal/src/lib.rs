//! hyspexrad-cal: Radiometric calibration and integer quantization.
//!
//! Converts raw digital counts to spectral radiance using the tables
//! embedded in the HySpex binary header, and compresses float radiance
//! to integers for storage.
//!

pub mod calibrate;
mod error;
pub mod quantize;

pub use calibrate::{CalibrationTables, RadiometricCalibrator};
pub use error::{Error, Result};
pub use quantize::{
    dequantize, quantize_auto, quantize_fixed, DEFAULT_SUB_CHUNK, DEFAULT_TOLERANCE,
};
