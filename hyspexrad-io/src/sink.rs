//! Chunked output sink for quantized spectra.
//!
//! Stands in for the downstream chunked-file writer: consumes an
//! ordered, single-pass sequence of quantized chunks and records the
//! scale factor and wavelength axis in a JSON sidecar next to the data.

use crate::{Error, Result};
use ndarray::Array1;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Metadata written alongside the quantized data.
#[derive(Debug, Serialize)]
pub struct SidecarMeta {
    /// Total rows written (lines × samples).
    pub rows: usize,
    /// Samples per line.
    pub samples: usize,
    /// Spectral bands per row.
    pub bands: usize,
    /// `float ≈ integer * scale_factor`.
    pub scale_factor: f64,
    /// Wavelength centers in nm, length `bands`.
    pub wavelengths_nm: Vec<f64>,
}

/// Consumes an ordered, exactly-once sequence of quantized chunks.
pub trait ChunkSink {
    /// Writes the next chunk of `rows` rows in row-major order.
    ///
    /// # Errors
    /// Returns an error if the chunk cannot be written.
    fn write_chunk(&mut self, values: &[i32], rows: usize) -> Result<()>;

    /// Finalizes the output after the last chunk.
    ///
    /// # Errors
    /// Returns an error if finalization fails.
    fn finish(&mut self, meta: &SidecarMeta) -> Result<()>;
}

/// Writes quantized chunks as little-endian i32 to a flat binary file,
/// with a `.json` sidecar for the metadata.
pub struct QuantizedChunkWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    bands: usize,
    rows_written: usize,
}

impl QuantizedChunkWriter {
    /// Creates the output file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, bands: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            bands,
            rows_written: 0,
        })
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

impl ChunkSink for QuantizedChunkWriter {
    fn write_chunk(&mut self, values: &[i32], rows: usize) -> Result<()> {
        if values.len() != rows * self.bands {
            return Err(Error::InvalidFormat(format!(
                "chunk holds {} values, expected {} ({rows} rows x {} bands)",
                values.len(),
                rows * self.bands,
                self.bands
            )));
        }
        for v in values {
            self.writer.write_all(&v.to_le_bytes())?;
        }
        self.rows_written += rows;
        Ok(())
    }

    fn finish(&mut self, meta: &SidecarMeta) -> Result<()> {
        self.writer.flush()?;
        let sidecar_path = self.path.with_extension("json");
        let sidecar = File::create(sidecar_path)?;
        serde_json::to_writer_pretty(BufWriter::new(sidecar), meta)?;
        Ok(())
    }
}

/// Builds the sidecar metadata for a completed stream.
#[must_use]
pub fn sidecar_meta(
    rows: usize,
    samples: usize,
    wavelengths: &Array1<f64>,
    scale_factor: f64,
) -> SidecarMeta {
    SidecarMeta {
        rows,
        samples,
        bands: wavelengths.len(),
        scale_factor,
        wavelengths_nm: wavelengths.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_write_chunks_and_sidecar() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.i32");
        let mut writer = QuantizedChunkWriter::create(&path, 2).unwrap();

        writer.write_chunk(&[1, 2, 3, 4], 2).unwrap();
        writer.write_chunk(&[5, 6], 1).unwrap();
        assert_eq!(writer.rows_written(), 3);

        let wavelengths = array![400.0, 500.0];
        let meta = sidecar_meta(3, 1, &wavelengths, 1e-6);
        writer.finish(&meta).unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 6 * 4);
        assert_eq!(&data[0..4], &1i32.to_le_bytes());

        let sidecar = std::fs::read_to_string(path.with_extension("json")).unwrap();
        assert!(sidecar.contains("\"scale_factor\""));
        assert!(sidecar.contains("400.0"));
    }

    #[test]
    fn test_ragged_chunk_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.i32");
        let mut writer = QuantizedChunkWriter::create(&path, 3).unwrap();
        assert!(writer.write_chunk(&[1, 2, 3, 4], 2).is_err());
    }
}
