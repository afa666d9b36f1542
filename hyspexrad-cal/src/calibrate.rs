//! Radiometric calibration of raw digital counts.
//!
//! Radiance is derived per pixel as
//! `(CN − BG[:, s]) / RE[:, s] / denominator[:, s]`, where the
//! denominator tensor combines quantum efficiency, bandwidth, wavelength,
//! and a scalar built from pixel geometry, aperture, integration time,
//! and physical constants. Everything is precomputed once per opened
//! cube and shared read-only across all calibration calls.

use crate::{Error, Result};
use hyspexrad_core::Error as CoreError;
use hyspexrad_envi::HyspexHeader;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Planck constant [J*s].
const PLANCK: f64 = 6.626_070_04e-34;

/// Speed of light in nanometers per second.
///
/// Wavelengths in the binary header are in nm; keeping c in nm/s makes
/// the denominator unit-consistent. A mismatch here corrupts radiance
/// silently, so the unit is part of the constant's name.
const SPEED_OF_LIGHT_NM_PER_S: f64 = 2.997_924_58e17;

/// Precomputed per-band, per-sample calibration tables.
///
/// All tables have shape [bands, samples] and are immutable after
/// construction.
#[derive(Debug, Clone)]
pub struct CalibrationTables {
    background: Array2<f32>,
    response: Array2<f32>,
    denominator: Array2<f32>,
    wavelengths: Array1<f64>,
    calib_available: bool,
}

impl CalibrationTables {
    /// Derives the calibration tables from a parsed binary header.
    ///
    /// # Errors
    /// Returns an error if the header declares zero bands or samples.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_header(hdr: &HyspexHeader) -> Result<Self> {
        let bands = hdr.spectral_size as usize;
        let samples = hdr.spatial_size as usize;
        if bands == 0 || samples == 0 {
            return Err(Error::ShapeMismatch(format!(
                "degenerate sensor geometry: {bands} bands x {samples} samples"
            )));
        }

        let background = hdr.background_before.mapv(|v| v as f32);
        let response = hdr.re.mapv(|v| v as f32);

        let wavelengths = hdr.spectral_calib.clone();

        // Bandwidth is the forward wavelength difference, with the last
        // value repeated to keep the vector at full length.
        let mut bandwidth = Array1::<f64>::zeros(bands);
        for b in 0..bands.saturating_sub(1) {
            bandwidth[b] = wavelengths[b + 1] - wavelengths[b];
        }
        if bands > 1 {
            bandwidth[bands - 1] = bandwidth[bands - 2];
        }

        let pixel_area = hdr.pixelsize_x * hdr.pixelsize_y;
        let aperture_area = std::f64::consts::PI * hdr.aperture_size * hdr.aperture_size;
        let integration_s = f64::from(hdr.integration_time) / 1e6;

        let scalingfactor = (pixel_area * integration_s * aperture_area * hdr.sf)
            / (PLANCK * SPEED_OF_LIGHT_NM_PER_S);

        log::debug!(
            "calibration tables: {bands} bands x {samples} samples, scalingfactor {scalingfactor:e}"
        );

        let denominator_1d: Array1<f64> =
            &hdr.qe * &bandwidth * &wavelengths * scalingfactor;
        let denominator = Array2::from_shape_fn((bands, samples), |(b, _)| {
            denominator_1d[b] as f32
        });

        Ok(Self {
            background,
            response,
            denominator,
            wavelengths,
            calib_available: hdr.calibration_available(),
        })
    }

    /// Number of spectral bands.
    #[must_use]
    pub fn bands(&self) -> usize {
        self.denominator.nrows()
    }

    /// Number of cross-track samples.
    #[must_use]
    pub fn samples(&self) -> usize {
        self.denominator.ncols()
    }

    /// Wavelength centers in nm.
    #[must_use]
    pub fn wavelengths(&self) -> &Array1<f64> {
        &self.wavelengths
    }

    /// True when the header carried usable calibration data.
    #[must_use]
    pub fn calibration_available(&self) -> bool {
        self.calib_available
    }

    /// The denominator tensor [bands, samples].
    #[must_use]
    pub fn denominator(&self) -> ArrayView2<'_, f32> {
        self.denominator.view()
    }
}

/// Converts raw spectra to radiance using precomputed tables.
#[derive(Debug, Clone)]
pub struct RadiometricCalibrator {
    tables: CalibrationTables,
}

impl RadiometricCalibrator {
    /// Builds a calibrator from a parsed binary header.
    ///
    /// # Errors
    /// Returns [`Error::CalibrationUnavailable`] when the header's
    /// calibration-availability flag is unset; the calibrator never
    /// fabricates radiance from an uncalibrated record.
    pub fn from_header(hdr: &HyspexHeader) -> Result<Self> {
        let tables = CalibrationTables::from_header(hdr)?;
        if !tables.calibration_available() {
            return Err(Error::CalibrationUnavailable);
        }
        Ok(Self { tables })
    }

    /// The precomputed tables.
    #[must_use]
    pub fn tables(&self) -> &CalibrationTables {
        &self.tables
    }

    /// Wavelength centers in nm.
    #[must_use]
    pub fn wavelengths(&self) -> &Array1<f64> {
        self.tables.wavelengths()
    }

    /// Calibrates a batch of raw spectra.
    ///
    /// `counts` has shape [pixels, bands]; `sample_indices` gives the
    /// cross-track sample each row was read from and must have one entry
    /// per row. Arithmetic is 32-bit float throughout.
    ///
    /// # Errors
    /// Returns an error before any work if a sample index is outside the
    /// sensor's spatial size or the shapes disagree.
    pub fn calibrate(
        &self,
        counts: ArrayView2<'_, f32>,
        sample_indices: &[usize],
    ) -> Result<Array2<f32>> {
        let bands = self.tables.bands();
        let samples = self.tables.samples();

        if counts.ncols() != bands {
            return Err(Error::ShapeMismatch(format!(
                "counts have {} bands, calibration tables have {bands}",
                counts.ncols()
            )));
        }
        if counts.nrows() != sample_indices.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} spectra but {} sample indices",
                counts.nrows(),
                sample_indices.len()
            )));
        }
        for &s in sample_indices {
            if s >= samples {
                return Err(Error::Core(CoreError::OutOfBounds {
                    axis: "sample",
                    index: s,
                    size: samples,
                }));
            }
        }

        let mut radiance = Array2::<f32>::zeros((counts.nrows(), bands));
        for (row, (&s, raw)) in sample_indices
            .iter()
            .zip(counts.axis_iter(Axis(0)))
            .enumerate()
        {
            for b in 0..bands {
                let cn = raw[b] - self.tables.background[[b, s]];
                let cn = cn / self.tables.response[[b, s]];
                radiance[[row, b]] = cn / self.tables.denominator[[b, s]];
            }
        }
        Ok(radiance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hyspexrad_envi::testing::{encode, HeaderSpec};
    use ndarray::array;

    fn header(spec: &HeaderSpec) -> HyspexHeader {
        HyspexHeader::parse(&encode(spec)).unwrap()
    }

    #[test]
    fn test_denominator_shape_and_values() {
        let spec = HeaderSpec::default();
        let tables = CalibrationTables::from_header(&header(&spec)).unwrap();
        assert_eq!(tables.denominator().dim(), (3, 2));

        // Denominator is constant across samples for a given band.
        let d = tables.denominator();
        assert_relative_eq!(d[[0, 0]], d[[0, 1]]);
        assert_relative_eq!(d[[2, 0]], d[[2, 1]]);

        // Hand-computed for band 0: qe * bw * wl * scalingfactor.
        let pixel_area = 6.5e-6_f64 * 6.5e-6;
        let aperture_area = std::f64::consts::PI * 0.009 * 0.009;
        let integration_s = 20_000.0 / 1e6;
        let scaling =
            (pixel_area * integration_s * aperture_area * 5.0) / (PLANCK * SPEED_OF_LIGHT_NM_PER_S);
        let expected = 0.5 * 100.0 * 400.0 * scaling;
        assert_relative_eq!(f64::from(d[[0, 0]]), expected, max_relative = 1e-6);
    }

    #[test]
    fn test_bandwidth_last_value_repeated() {
        let mut spec = HeaderSpec::default();
        spec.wavelengths = vec![400.0, 450.0, 530.0];
        let tables = CalibrationTables::from_header(&header(&spec)).unwrap();
        let d = tables.denominator();
        // band 1 bw = 80, band 2 bw = repeated 80
        let ratio = f64::from(d[[2, 0]]) / f64::from(d[[1, 0]]);
        // d2/d1 = (qe2*bw2*wl2)/(qe1*bw1*wl1) with bw1 == bw2
        let expected = (0.7 * 530.0) / (0.6 * 450.0);
        assert_relative_eq!(ratio, expected, max_relative = 1e-6);
    }

    #[test]
    fn test_calibration_linear_in_response() {
        let spec = HeaderSpec::default();
        let hdr = header(&spec);
        let calibrator = RadiometricCalibrator::from_header(&hdr).unwrap();

        let mut doubled = spec;
        doubled.re = vec![2.0; 6];
        let calibrator2 = RadiometricCalibrator::from_header(&header(&doubled)).unwrap();

        let counts = array![[110.0_f32, 130.0, 150.0]];
        let r1 = calibrator.calibrate(counts.view(), &[0]).unwrap();
        let r2 = calibrator2.calibrate(counts.view(), &[0]).unwrap();

        for b in 0..3 {
            assert_relative_eq!(r1[[0, b]], 2.0 * r2[[0, b]], max_relative = 1e-6);
        }
    }

    #[test]
    fn test_background_subtraction() {
        let spec = HeaderSpec::default();
        let calibrator = RadiometricCalibrator::from_header(&header(&spec)).unwrap();

        // Counts equal to the background must calibrate to zero.
        let counts = array![[10.0_f32, 10.0, 10.0]];
        let r = calibrator.calibrate(counts.view(), &[1]).unwrap();
        for b in 0..3 {
            assert_relative_eq!(r[[0, b]], 0.0);
        }
    }

    #[test]
    fn test_sample_index_out_of_bounds() {
        let spec = HeaderSpec::default();
        let calibrator = RadiometricCalibrator::from_header(&header(&spec)).unwrap();
        let counts = array![[110.0_f32, 130.0, 150.0]];
        let result = calibrator.calibrate(counts.view(), &[2]);
        assert!(matches!(
            result,
            Err(Error::Core(CoreError::OutOfBounds { axis: "sample", .. }))
        ));
    }

    #[test]
    fn test_calibration_unavailable() {
        let mut spec = HeaderSpec::default();
        spec.calib_available = 0;
        let result = RadiometricCalibrator::from_header(&header(&spec));
        assert!(matches!(result, Err(Error::CalibrationUnavailable)));
    }
}
