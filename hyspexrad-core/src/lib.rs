//! hyspexrad-core: Core types for HySpex hyperspectral cube processing.
//!
//! This crate provides the shared error taxonomy, the ENVI dtype table,
//! and the interleave/dimension types used by the parsing, calibration,
//! and I/O crates.
//!

pub mod dtype;
pub mod error;

pub use dtype::{CubeDims, EnviDtype, Interleave};
pub use error::{Error, Result};
