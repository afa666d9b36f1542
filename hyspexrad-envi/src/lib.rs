//! hyspexrad-envi: ENVI sidecar and HySpex binary header parsers.
//!
//! The ASCII sidecar declares the cube geometry and interleave; the
//! binary preamble embedded in the .hyspex file carries the sensor
//! state and the per-pixel calibration arrays.
//!

pub mod ascii;
pub mod binary;
mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use ascii::{EnviHeader, EnviParserConfig, HeaderValue};
pub use binary::HyspexHeader;
pub use error::{Error, Result};
