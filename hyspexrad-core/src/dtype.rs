//! ENVI numeric dtype codes and cube interleave layouts.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Numeric dtype codes used by the ENVI `data type` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EnviDtype {
    /// Unsigned byte (code 1).
    U8,
    /// 16-bit signed integer (code 2).
    I16,
    /// 32-bit signed integer (code 3).
    I32,
    /// 32-bit float (code 4).
    F32,
    /// 64-bit float (code 5).
    F64,
    /// 2x32-bit complex (code 6).
    C64,
    /// 2x64-bit complex (code 9).
    C128,
    /// 16-bit unsigned integer (code 12).
    U16,
    /// 32-bit unsigned integer (code 13).
    U32,
    /// 64-bit signed integer (code 14).
    I64,
    /// 64-bit unsigned integer (code 15).
    U64,
}

impl EnviDtype {
    /// Maps an ENVI `data type` code to a dtype.
    ///
    /// # Errors
    /// Returns an error for codes not in the ENVI table.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(EnviDtype::U8),
            2 => Ok(EnviDtype::I16),
            3 => Ok(EnviDtype::I32),
            4 => Ok(EnviDtype::F32),
            5 => Ok(EnviDtype::F64),
            6 => Ok(EnviDtype::C64),
            9 => Ok(EnviDtype::C128),
            12 => Ok(EnviDtype::U16),
            13 => Ok(EnviDtype::U32),
            14 => Ok(EnviDtype::I64),
            15 => Ok(EnviDtype::U64),
            _ => Err(Error::InvalidFormat(format!("unknown ENVI data type: {code}"))),
        }
    }

    /// Size of one element in bytes.
    #[must_use]
    pub fn size_bytes(self) -> usize {
        match self {
            EnviDtype::U8 => 1,
            EnviDtype::I16 | EnviDtype::U16 => 2,
            EnviDtype::I32 | EnviDtype::U32 | EnviDtype::F32 => 4,
            EnviDtype::F64 | EnviDtype::I64 | EnviDtype::U64 | EnviDtype::C64 => 8,
            EnviDtype::C128 => 16,
        }
    }

    /// Returns true for complex dtypes, which cannot be read as raw counts.
    #[must_use]
    pub fn is_complex(self) -> bool {
        matches!(self, EnviDtype::C64 | EnviDtype::C128)
    }
}

/// On-disk ordering of the (line, band, sample) axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Interleave {
    /// Band-interleaved-by-line: [lines, bands, samples].
    Bil,
    /// Band-interleaved-by-pixel: [lines, samples, bands].
    Bip,
    /// Band-sequential: [bands, lines, samples].
    Bsq,
}

impl Interleave {
    /// Parses the ENVI `interleave` header value (case-insensitive).
    ///
    /// # Errors
    /// Returns an error for anything other than `bil`, `bip`, or `bsq`.
    pub fn from_header_value(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bil" => Ok(Interleave::Bil),
            "bip" => Ok(Interleave::Bip),
            "bsq" => Ok(Interleave::Bsq),
            other => Err(Error::InvalidFormat(format!("unknown interleave: {other}"))),
        }
    }
}

impl std::fmt::Display for Interleave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Interleave::Bil => "bil",
            Interleave::Bip => "bip",
            Interleave::Bsq => "bsq",
        };
        write!(f, "{name}")
    }
}

/// Logical dimensions of a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CubeDims {
    /// Along-track lines.
    pub lines: usize,
    /// Cross-track samples per line.
    pub samples: usize,
    /// Spectral bands.
    pub bands: usize,
}

impl CubeDims {
    /// Total number of elements in the cube.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines * self.samples * self.bands
    }

    /// Returns true if any axis is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines == 0 || self.samples == 0 || self.bands == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_from_code() {
        assert!(matches!(EnviDtype::from_code(12), Ok(EnviDtype::U16)));
        assert!(matches!(EnviDtype::from_code(4), Ok(EnviDtype::F32)));
        assert!(EnviDtype::from_code(7).is_err());
        assert!(EnviDtype::from_code(0).is_err());
    }

    #[test]
    fn test_dtype_sizes() {
        assert_eq!(EnviDtype::U8.size_bytes(), 1);
        assert_eq!(EnviDtype::U16.size_bytes(), 2);
        assert_eq!(EnviDtype::F64.size_bytes(), 8);
        assert_eq!(EnviDtype::C128.size_bytes(), 16);
    }

    #[test]
    fn test_interleave_parse() {
        assert!(matches!(
            Interleave::from_header_value("BIL"),
            Ok(Interleave::Bil)
        ));
        assert!(matches!(
            Interleave::from_header_value(" bsq "),
            Ok(Interleave::Bsq)
        ));
        assert!(Interleave::from_header_value("bsq2").is_err());
    }

    #[test]
    fn test_cube_dims() {
        let dims = CubeDims {
            lines: 10,
            samples: 2,
            bands: 3,
        };
        assert_eq!(dims.len(), 60);
        assert!(!dims.is_empty());
    }
}
