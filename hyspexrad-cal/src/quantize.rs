//! Integer quantization of 32-bit-float spectral data.
//!
//! Two separately evolved policies with different guarantees:
//!
//! - [`quantize_fixed`] takes a known scale factor and processes the
//!   input in bounded sub-chunks, so working memory stays O(sub-chunk)
//!   no matter how large the array is.
//! - [`quantize_auto`] searches ascending powers of ten for the smallest
//!   scale that represents every element within tolerance. It must see
//!   the whole array to establish a global scale; that is an accepted
//!   trade-off, not a defect.
//!
//! Both guarantee `dequantize(quantize(x)) ≈ x` within `1/scale`
//! absolute error.

use crate::{Error, Result};
use hyspexrad_core::Error as CoreError;

/// Sub-chunk length for the fixed-scale quantizer.
pub const DEFAULT_SUB_CHUNK: usize = 1_000_000;

/// Default absolute tolerance for the auto-scale search.
///
/// Loose enough to absorb f32 representation error after scaling by the
/// candidate power of ten.
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Quantizes with a known scale factor: `round(value / scale_factor)`.
///
/// `scale_factor` is the value written alongside the data (e.g. `1e-6`),
/// so dequantization is `q * scale_factor`. The input is processed in
/// sub-chunks of at most `sub_chunk` elements.
///
/// # Errors
/// Returns an error if `scale_factor` is not finite and positive, or
/// `sub_chunk` is zero.
#[allow(clippy::cast_possible_truncation)]
pub fn quantize_fixed(values: &[f32], scale_factor: f64, sub_chunk: usize) -> Result<Vec<i32>> {
    if !(scale_factor.is_finite() && scale_factor > 0.0) {
        return Err(Error::InvalidScale(scale_factor));
    }
    if sub_chunk == 0 {
        return Err(Error::InvalidSubChunk(sub_chunk));
    }

    let scale = 1.0 / scale_factor;
    let mut out = Vec::with_capacity(values.len());
    for chunk in values.chunks(sub_chunk) {
        out.extend(chunk.iter().map(|&v| (f64::from(v) * scale).round() as i32));
    }
    Ok(out)
}

/// Searches powers of ten (1, 10, 100, ...) up to `max_scale` for the
/// smallest scale at which every element, multiplied by the scale, is
/// within `tolerance` of its rounded value.
///
/// Returns the quantized array and the scale used; dequantization is
/// `q / scale`.
///
/// # Errors
/// Returns an error if no power of ten up to `max_scale` satisfies the
/// tolerance for all elements.
#[allow(clippy::cast_possible_truncation)]
pub fn quantize_auto(values: &[f32], max_scale: u32, tolerance: f64) -> Result<(Vec<i32>, u32)> {
    let mut scale = 1u32;
    while scale <= max_scale {
        let s = f64::from(scale);
        let fits = values.iter().all(|&v| {
            let x = f64::from(v) * s;
            (x - x.round()).abs() <= tolerance
        });
        if fits {
            let quantized = values
                .iter()
                .map(|&v| (f64::from(v) * s).round() as i32)
                .collect();
            return Ok((quantized, scale));
        }
        let Some(next) = scale.checked_mul(10) else {
            break;
        };
        scale = next;
    }
    Err(Error::Core(CoreError::NoSuitableScale {
        max_scale,
        tolerance,
    }))
}

/// Recovers floats from a fixed-scale quantization: `q * scale_factor`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn dequantize(quantized: &[i32], scale_factor: f64) -> Vec<f32> {
    quantized
        .iter()
        .map(|&q| (f64::from(q) * scale_factor) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_scale_roundtrip_within_tolerance() {
        // Values spanning [0, 1] with awkward fractions.
        let values: Vec<f32> = (0..10_000).map(|i| i as f32 / 9_999.0).collect();
        let scale_factor = 1e-6;
        let q = quantize_fixed(&values, scale_factor, 1024).unwrap();
        let back = dequantize(&q, scale_factor);
        for (orig, rec) in values.iter().zip(&back) {
            assert!(
                (orig - rec).abs() <= 1e-6,
                "roundtrip error {} for value {orig}",
                (orig - rec).abs()
            );
        }
    }

    #[test]
    fn test_fixed_scale_subchunking_matches_single_pass() {
        let values: Vec<f32> = (0..100).map(|i| i as f32 * 0.37).collect();
        let small = quantize_fixed(&values, 1e-3, 7).unwrap();
        let large = quantize_fixed(&values, 1e-3, usize::MAX).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_fixed_scale_rejects_bad_scale() {
        assert!(matches!(
            quantize_fixed(&[1.0], 0.0, 16),
            Err(Error::InvalidScale(_))
        ));
        assert!(matches!(
            quantize_fixed(&[1.0], f64::NAN, 16),
            Err(Error::InvalidScale(_))
        ));
    }

    #[test]
    fn test_zero_sub_chunk_rejected() {
        assert!(matches!(
            quantize_fixed(&[1.0], 1e-3, 0),
            Err(Error::InvalidSubChunk(0))
        ));
    }

    #[test]
    fn test_auto_scale_two_decimals() {
        let values = [0.25_f32, 0.5, 0.75, 0.07, 0.99];
        let (q, scale) = quantize_auto(&values, 1_000_000, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(scale, 100);
        assert_eq!(q, vec![25, 50, 75, 7, 99]);

        // Exact round-trip: each recovered value equals the f32 input.
        let back = dequantize(&q, 1.0 / f64::from(scale));
        assert_eq!(back, values);
    }

    #[test]
    fn test_auto_scale_integers_use_scale_one() {
        let values = [1.0_f32, 42.0, 7.0];
        let (q, scale) = quantize_auto(&values, 1_000_000, DEFAULT_TOLERANCE).unwrap();
        assert_eq!(scale, 1);
        assert_eq!(q, vec![1, 42, 7]);
    }

    #[test]
    fn test_auto_scale_exhausts_ceiling() {
        // An irrational-ish value never lands on a power-of-ten grid.
        let values = [std::f32::consts::FRAC_1_SQRT_2];
        let result = quantize_auto(&values, 100, 1e-9);
        assert!(matches!(
            result,
            Err(Error::Core(CoreError::NoSuitableScale { .. }))
        ));
    }
}
