//! Chunked streaming over a line range.
//!
//! [`StreamingLineReader`] is a single-pass, non-restartable pull
//! iterator: each call to [`StreamingLineReader::next_chunk`] produces
//! the next chunk of calibrated (or raw) spectra in strictly increasing
//! line order, with at most one chunk's worth of lines in flight. The
//! consumer may stop pulling at any point; dropping the reader releases
//! the file mapping.

use crate::cube::{CalibratedCube, HyspexFile};
use crate::{Error, Result};
use hyspexrad_core::{Error as CoreError, Interleave};
use ndarray::{Array1, Array2, s};
use std::path::Path;
use sysinfo::System;

/// One chunk of streamed spectra: shape [lines_in_chunk × samples, bands],
/// 32-bit float.
pub type StreamChunk = Array2<f32>;

/// Fraction of available memory targeted when no explicit chunk size is
/// given.
const DEFAULT_MEMORY_FRACTION: f64 = 0.25;

/// Configuration for the streaming line reader.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// First line to read (inclusive).
    pub start_line: usize,
    /// Last line to read (inclusive).
    pub end_line: usize,
    /// Lines per chunk. `None` resolves a size from available memory.
    pub chunk_lines: Option<usize>,
    /// Whether to calibrate to radiance or pass raw counts through.
    pub calibrate: bool,
    /// Log progress every this many lines; 0 disables progress logging.
    pub log_interval: usize,
}

impl StreamConfig {
    /// Creates a configuration covering `start_line..=end_line` with
    /// calibration on and a memory-derived chunk size.
    #[must_use]
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
            chunk_lines: None,
            calibrate: true,
            log_interval: 0,
        }
    }

    /// Sets an explicit chunk size in lines.
    #[must_use]
    pub fn with_chunk_lines(mut self, lines: usize) -> Self {
        self.chunk_lines = Some(lines);
        self
    }

    /// Sets whether chunks are calibrated radiance or raw counts.
    #[must_use]
    pub fn with_calibrate(mut self, calibrate: bool) -> Self {
        self.calibrate = calibrate;
        self
    }

    /// Sets the progress-log interval in lines (0 disables).
    #[must_use]
    pub fn with_log_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval;
        self
    }

    /// Resolves the chunk size in lines.
    ///
    /// An explicit value always wins; otherwise a fraction of available
    /// system memory is divided by the f32 footprint of one line.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn resolve_chunk_lines(&self, samples: usize, bands: usize) -> usize {
        if let Some(lines) = self.chunk_lines {
            return lines.max(1);
        }
        let mut system = System::new();
        system.refresh_memory();
        let available = system.available_memory();
        let budget = (available as f64 * DEFAULT_MEMORY_FRACTION).floor() as u64;
        let bytes_per_line = (samples * bands * std::mem::size_of::<f32>()) as u64;
        let lines = if bytes_per_line == 0 {
            1
        } else {
            budget / bytes_per_line
        };
        usize::try_from(lines).unwrap_or(usize::MAX).max(1)
    }
}

/// Streams a line range as fixed-size chunks of calibrated or raw
/// spectra.
pub struct StreamingLineReader {
    file: HyspexFile,
    calibrated: Option<CalibratedCube>,
    wavelengths: Array1<f64>,
    sample_indices: Vec<usize>,
    next_line: usize,
    end_line: usize,
    chunk_lines: usize,
    log_interval: usize,
    fused: bool,
}

impl StreamingLineReader {
    /// Opens a cube and validates the streaming preconditions.
    ///
    /// Only the band-interleaved-by-line layout is streamable; any other
    /// interleave fails here, before the first chunk. The line range is
    /// validated against the file-size-corrected line count.
    ///
    /// # Errors
    /// Returns an error for a non-BIL cube, an invalid line range, or
    /// (with calibration requested) a header without calibration data.
    pub fn open<P: AsRef<Path>>(path: P, config: &StreamConfig) -> Result<Self> {
        let file = HyspexFile::open(path)?;

        let interleave = file.cube().interleave();
        if interleave != Interleave::Bil {
            return Err(Error::InvalidFormat(format!(
                "streaming supports only bil interleave, cube is {interleave}"
            )));
        }

        let dims = file.cube().dims();
        if config.start_line > config.end_line {
            return Err(Error::InvalidFormat(format!(
                "start line {} after end line {}",
                config.start_line, config.end_line
            )));
        }
        if config.end_line >= dims.lines {
            return Err(Error::Core(CoreError::OutOfBounds {
                axis: "line",
                index: config.end_line,
                size: dims.lines,
            }));
        }

        let calibrated = if config.calibrate {
            Some(CalibratedCube::new(&file)?)
        } else {
            None
        };
        let wavelengths = file.binary().spectral_calib.clone();
        let chunk_lines = config.resolve_chunk_lines(dims.samples, dims.bands);

        log::debug!(
            "streaming {} lines {}..={} in chunks of {chunk_lines}",
            file.cube().path().display(),
            config.start_line,
            config.end_line
        );

        Ok(Self {
            file,
            calibrated,
            wavelengths,
            sample_indices: (0..dims.samples).collect(),
            next_line: config.start_line,
            end_line: config.end_line,
            chunk_lines,
            log_interval: config.log_interval,
            fused: false,
        })
    }

    /// Wavelength centers in nm, fixed for the whole stream.
    #[must_use]
    pub fn wavelengths(&self) -> &Array1<f64> {
        &self.wavelengths
    }

    /// The opened file, for header access.
    #[must_use]
    pub fn file(&self) -> &HyspexFile {
        &self.file
    }

    /// Number of rows (pixels) the remaining stream will produce.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        if self.fused || self.next_line > self.end_line {
            return 0;
        }
        (self.end_line - self.next_line + 1) * self.file.cube().dims().samples
    }

    fn read_line(&self, line: usize) -> Result<Array2<f32>> {
        match &self.calibrated {
            Some(calibrated) => {
                let counts = self.file.cube().line_spectra(line)?;
                Ok(calibrated
                    .calibrator()
                    .calibrate(counts.view(), &self.sample_indices)?)
            }
            None => self.file.cube().line_spectra(line),
        }
    }

    /// Produces the next chunk, or `None` once the range is exhausted.
    ///
    /// The final chunk may hold fewer than the configured number of
    /// lines. After an error the stream is fused and yields `None`.
    pub fn next_chunk(&mut self) -> Option<Result<StreamChunk>> {
        if self.fused || self.next_line > self.end_line {
            return None;
        }

        let dims = self.file.cube().dims();
        let chunk_end = (self.next_line + self.chunk_lines - 1).min(self.end_line);
        let n_lines = chunk_end - self.next_line + 1;
        let mut chunk = Array2::<f32>::zeros((n_lines * dims.samples, dims.bands));

        for (i, line) in (self.next_line..=chunk_end).enumerate() {
            if self.log_interval > 0 && line % self.log_interval == 0 {
                log::info!(
                    "{}: line {line} of {}",
                    self.file.cube().path().display(),
                    self.end_line
                );
            }
            let spectra = match self.read_line(line) {
                Ok(spectra) => spectra,
                Err(e) => {
                    self.fused = true;
                    return Some(Err(e));
                }
            };
            let row = i * dims.samples;
            chunk
                .slice_mut(s![row..row + dims.samples, ..])
                .assign(&spectra);
        }

        self.next_line = chunk_end + 1;
        Some(Ok(chunk))
    }
}

impl Iterator for StreamingLineReader {
    type Item = Result<StreamChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::write_cube;
    use approx::assert_relative_eq;
    use hyspexrad_envi::testing::HeaderSpec;
    use tempfile::TempDir;

    fn open(
        dir: &TempDir,
        lines: usize,
        interleave: Interleave,
        config: &StreamConfig,
    ) -> Result<StreamingLineReader> {
        let spec = HeaderSpec::default();
        let path = write_cube(dir, &spec, lines, lines, interleave);
        StreamingLineReader::open(path, config)
    }

    #[test]
    fn test_chunk_row_counts() {
        let dir = TempDir::new().unwrap();
        let config = StreamConfig::new(0, 9).with_chunk_lines(4).with_calibrate(false);
        let reader = open(&dir, 10, Interleave::Bil, &config).unwrap();

        let chunks: Vec<_> = reader.map(Result::unwrap).collect();
        let rows: Vec<usize> = chunks.iter().map(|c| c.nrows()).collect();
        // samples = 2: 4, 4, and 2 lines per chunk.
        assert_eq!(rows, vec![8, 8, 4]);
        assert_eq!(rows.iter().sum::<usize>(), 10 * 2);
    }

    #[test]
    fn test_chunks_in_line_order() {
        let dir = TempDir::new().unwrap();
        let config = StreamConfig::new(2, 7).with_chunk_lines(3).with_calibrate(false);
        let reader = open(&dir, 10, Interleave::Bil, &config).unwrap();

        let mut expected_line = 2;
        for chunk in reader {
            let chunk = chunk.unwrap();
            // Row 0 of each chunk is (line, band 0, sample 0) = line*100.
            assert_relative_eq!(chunk[[0, 0]], (expected_line * 100) as f32);
            expected_line += chunk.nrows() / 2;
        }
        assert_eq!(expected_line, 8);
    }

    #[test]
    fn test_final_partial_chunk_only() {
        let dir = TempDir::new().unwrap();
        // Range of 3 lines with chunk size 10: one partial chunk.
        let config = StreamConfig::new(0, 2).with_chunk_lines(10).with_calibrate(false);
        let reader = open(&dir, 5, Interleave::Bil, &config).unwrap();
        let chunks: Vec<_> = reader.map(Result::unwrap).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].nrows(), 6);
    }

    #[test]
    fn test_non_bil_rejected_before_first_chunk() {
        let dir = TempDir::new().unwrap();
        let config = StreamConfig::new(0, 1).with_calibrate(false);
        let result = open(&dir, 4, Interleave::Bip, &config);
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_range_beyond_cube_rejected() {
        let dir = TempDir::new().unwrap();
        let config = StreamConfig::new(0, 99).with_calibrate(false);
        let result = open(&dir, 4, Interleave::Bil, &config);
        assert!(matches!(
            result,
            Err(Error::Core(CoreError::OutOfBounds { axis: "line", .. }))
        ));
    }

    #[test]
    fn test_calibrated_stream_matches_pixel_calibration() {
        let dir = TempDir::new().unwrap();
        let spec = HeaderSpec::default();
        let path = write_cube(&dir, &spec, 4, 4, Interleave::Bil);

        let config = StreamConfig::new(1, 2).with_chunk_lines(2);
        let mut reader = StreamingLineReader::open(&path, &config).unwrap();
        let chunk = reader.next_chunk().unwrap().unwrap();
        assert_eq!(chunk.dim(), (4, 3));

        let file = crate::cube::HyspexFile::open(&path).unwrap();
        let calibrated = crate::cube::CalibratedCube::new(&file).unwrap();
        let expected = calibrated.calibrate(&[1, 1, 2, 2], &[0, 1, 0, 1]).unwrap();
        for row in 0..4 {
            for band in 0..3 {
                assert_relative_eq!(chunk[[row, band]], expected[[row, band]]);
            }
        }
    }

    #[test]
    fn test_wavelengths_exposed() {
        let dir = TempDir::new().unwrap();
        let config = StreamConfig::new(0, 1).with_calibrate(false);
        let reader = open(&dir, 4, Interleave::Bil, &config).unwrap();
        assert_eq!(reader.wavelengths().len(), 3);
        assert_relative_eq!(reader.wavelengths()[0], 400.0);
    }
}
