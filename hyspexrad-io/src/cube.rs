//! Memory-mapped access to the raw pixel cube.
//!
//! A .hyspex file is the binary preamble followed by the pixel cube in
//! one of three interleavings. [`RawCube`] exposes logical
//! (line, band, sample) addressing over the mapping regardless of the
//! on-disk layout; pages are faulted in on demand and the full cube is
//! never materialized.

use crate::{Error, Result};
use hyspexrad_core::{CubeDims, EnviDtype, Error as CoreError, Interleave};
use hyspexrad_envi::{EnviHeader, HyspexHeader};
use memmap2::Mmap;
use ndarray::Array2;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A read-only, lazily-paged view of the pixel data region.
///
/// Cheap to clone; clones share the same mapping. The mapping is
/// released when the last clone is dropped.
#[derive(Clone)]
pub struct RawCube {
    mmap: Arc<Mmap>,
    path: PathBuf,
    offset: usize,
    dims: CubeDims,
    dtype: EnviDtype,
    interleave: Interleave,
}

impl RawCube {
    /// Wraps a mapping whose first `offset` bytes are the binary
    /// preamble.
    ///
    /// The line count is recomputed from the file size; if it disagrees
    /// with the header-declared value, the discrepancy is logged and the
    /// computed value wins.
    ///
    /// # Errors
    /// Returns an error for complex dtypes, an offset beyond the file
    /// end, or a data region smaller than one line.
    pub(crate) fn new(
        mmap: Arc<Mmap>,
        path: PathBuf,
        offset: usize,
        declared: CubeDims,
        dtype: EnviDtype,
        interleave: Interleave,
    ) -> Result<Self> {
        if dtype.is_complex() {
            return Err(Error::Core(CoreError::UnsupportedDtype(format!(
                "complex dtype {dtype:?} cannot be read as raw counts"
            ))));
        }
        if offset > mmap.len() {
            return Err(Error::InvalidFormat(format!(
                "header offset {offset} beyond file size {}",
                mmap.len()
            )));
        }

        let bytes_per_line = declared.samples * declared.bands * dtype.size_bytes();
        if bytes_per_line == 0 {
            return Err(Error::InvalidFormat(
                "header declares zero samples or bands".to_string(),
            ));
        }
        let lines = (mmap.len() - offset) / bytes_per_line;
        if lines == 0 {
            return Err(Error::InvalidFormat(format!(
                "file holds no complete lines ({} data bytes, {bytes_per_line} per line)",
                mmap.len() - offset
            )));
        }
        if lines != declared.lines {
            log::warn!(
                "{}: line count from file size is {lines}, header declares {}; using file size",
                path.display(),
                declared.lines
            );
        }

        Ok(Self {
            mmap,
            path,
            offset,
            dims: CubeDims {
                lines,
                ..declared
            },
            dtype,
            interleave,
        })
    }

    /// Cube dimensions with the file-size-corrected line count.
    #[must_use]
    pub fn dims(&self) -> CubeDims {
        self.dims
    }

    /// Element dtype of the stored counts.
    #[must_use]
    pub fn dtype(&self) -> EnviDtype {
        self.dtype
    }

    /// On-disk interleave layout.
    #[must_use]
    pub fn interleave(&self) -> Interleave {
        self.interleave
    }

    /// Path of the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn element_index(&self, line: usize, band: usize, sample: usize) -> usize {
        let CubeDims {
            lines,
            samples,
            bands,
        } = self.dims;
        match self.interleave {
            Interleave::Bil => (line * bands + band) * samples + sample,
            Interleave::Bip => (line * samples + sample) * bands + band,
            Interleave::Bsq => (band * lines + line) * samples + sample,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode(&self, elem_index: usize) -> f32 {
        let width = self.dtype.size_bytes();
        let start = self.offset + elem_index * width;
        let bytes = &self.mmap[start..start + width];
        match self.dtype {
            EnviDtype::U8 => f32::from(bytes[0]),
            EnviDtype::I16 => f32::from(i16::from_le_bytes(bytes.try_into().expect("2 bytes"))),
            EnviDtype::U16 => f32::from(u16::from_le_bytes(bytes.try_into().expect("2 bytes"))),
            EnviDtype::I32 => i32::from_le_bytes(bytes.try_into().expect("4 bytes")) as f32,
            EnviDtype::U32 => u32::from_le_bytes(bytes.try_into().expect("4 bytes")) as f32,
            EnviDtype::I64 => i64::from_le_bytes(bytes.try_into().expect("8 bytes")) as f32,
            EnviDtype::U64 => u64::from_le_bytes(bytes.try_into().expect("8 bytes")) as f32,
            EnviDtype::F32 => f32::from_le_bytes(bytes.try_into().expect("4 bytes")),
            #[allow(clippy::cast_possible_truncation)]
            EnviDtype::F64 => f64::from_le_bytes(bytes.try_into().expect("8 bytes")) as f32,
            // rejected in the constructor
            EnviDtype::C64 | EnviDtype::C128 => unreachable!("complex dtypes are rejected at open"),
        }
    }

    fn check_bounds(&self, line: usize, band: usize, sample: usize) -> Result<()> {
        let CubeDims {
            lines,
            samples,
            bands,
        } = self.dims;
        if line >= lines {
            return Err(Error::Core(CoreError::OutOfBounds {
                axis: "line",
                index: line,
                size: lines,
            }));
        }
        if band >= bands {
            return Err(Error::Core(CoreError::OutOfBounds {
                axis: "band",
                index: band,
                size: bands,
            }));
        }
        if sample >= samples {
            return Err(Error::Core(CoreError::OutOfBounds {
                axis: "sample",
                index: sample,
                size: samples,
            }));
        }
        Ok(())
    }

    /// Reads one element as f32, converting from the stored dtype.
    ///
    /// # Errors
    /// Returns an error if any index is outside the cube.
    pub fn value(&self, line: usize, band: usize, sample: usize) -> Result<f32> {
        self.check_bounds(line, band, sample)?;
        Ok(self.decode(self.element_index(line, band, sample)))
    }

    /// Reads all spectra of one line as a [samples, bands] array.
    ///
    /// # Errors
    /// Returns an error if `line` is outside the cube.
    pub fn line_spectra(&self, line: usize) -> Result<Array2<f32>> {
        self.check_bounds(line, 0, 0)?;
        let CubeDims { samples, bands, .. } = self.dims;
        let mut out = Array2::<f32>::zeros((samples, bands));
        for s in 0..samples {
            for b in 0..bands {
                out[[s, b]] = self.decode(self.element_index(line, b, s));
            }
        }
        Ok(out)
    }
}

/// An opened .hyspex file: both headers plus the mapped pixel cube.
///
/// The ASCII sidecar is found next to the raw file with the extension
/// replaced by `.hdr`. Headers are parsed once at open time and are
/// immutable for the lifetime of the reader.
pub struct HyspexFile {
    ascii: EnviHeader,
    binary: HyspexHeader,
    cube: RawCube,
}

impl HyspexFile {
    /// Opens a raw cube file and its sidecar header.
    ///
    /// The sidecar's line count is untrustworthy and is recomputed from
    /// the file size. Band and sample counts have no such arbiter:
    /// neither header outranks the other, so a disagreement between
    /// them means an unusable file rather than a correctable one.
    ///
    /// # Errors
    /// Returns an error if either header fails to parse, the binary
    /// preamble is absent, or the two headers disagree on band/sample
    /// geometry.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ascii = EnviHeader::from_file(path.with_extension("hdr"))?;

        let offset = ascii.header_offset()?;
        if offset == 0 {
            return Err(Error::InvalidFormat(format!(
                "{}: no binary preamble (header offset is 0)",
                path.display()
            )));
        }

        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        let mmap = Arc::new(mmap);

        if offset > mmap.len() {
            return Err(Error::InvalidFormat(format!(
                "{}: header offset {offset} beyond file size {}",
                path.display(),
                mmap.len()
            )));
        }
        let binary = HyspexHeader::parse(&mmap[..offset])?;

        let declared = ascii.dims()?;
        if binary.spectral_size as usize != declared.bands
            || binary.spatial_size as usize != declared.samples
        {
            return Err(Error::InvalidFormat(format!(
                "{}: binary header geometry {}x{} disagrees with sidecar {}x{} \
                 (bands x samples); neither header can be trusted over the other",
                path.display(),
                binary.spectral_size,
                binary.spatial_size,
                declared.bands,
                declared.samples
            )));
        }

        let cube = RawCube::new(
            mmap,
            path.to_path_buf(),
            offset,
            declared,
            ascii.data_type()?,
            ascii.interleave()?,
        )?;

        Ok(Self {
            ascii,
            binary,
            cube,
        })
    }

    /// The parsed ASCII sidecar.
    #[must_use]
    pub fn ascii(&self) -> &EnviHeader {
        &self.ascii
    }

    /// The parsed binary preamble.
    #[must_use]
    pub fn binary(&self) -> &HyspexHeader {
        &self.binary
    }

    /// The mapped pixel cube.
    #[must_use]
    pub fn cube(&self) -> &RawCube {
        &self.cube
    }
}

/// A cube paired with its calibrator, for direct pixel calibration.
pub struct CalibratedCube {
    cube: RawCube,
    calibrator: hyspexrad_cal::RadiometricCalibrator,
}

impl CalibratedCube {
    /// Builds the calibrator from an opened file's binary header.
    ///
    /// # Errors
    /// Returns an error when the header carries no usable calibration
    /// data.
    pub fn new(file: &HyspexFile) -> Result<Self> {
        let calibrator = hyspexrad_cal::RadiometricCalibrator::from_header(file.binary())?;
        Ok(Self {
            cube: file.cube().clone(),
            calibrator,
        })
    }

    /// The underlying calibrator.
    #[must_use]
    pub fn calibrator(&self) -> &hyspexrad_cal::RadiometricCalibrator {
        &self.calibrator
    }

    /// Calibrates an arbitrary set of (line, sample) pixels.
    ///
    /// `line_indices` and `sample_indices` are equal-length sequences;
    /// pixel `i` is (`line_indices[i]`, `sample_indices[i]`). Returns
    /// radiance of shape [pixels, bands].
    ///
    /// # Errors
    /// Returns an error before any work if the index slices differ in
    /// length or any coordinate is outside the cube.
    pub fn calibrate(
        &self,
        line_indices: &[usize],
        sample_indices: &[usize],
    ) -> Result<Array2<f32>> {
        if line_indices.len() != sample_indices.len() {
            return Err(Error::Cal(hyspexrad_cal::Error::ShapeMismatch(format!(
                "{} line indices but {} sample indices",
                line_indices.len(),
                sample_indices.len()
            ))));
        }
        let dims = self.cube.dims();
        for (&line, &sample) in line_indices.iter().zip(sample_indices) {
            self.cube.check_bounds(line, 0, sample)?;
        }

        let bands = dims.bands;
        let mut counts = Array2::<f32>::zeros((line_indices.len(), bands));
        for (row, (&line, &sample)) in line_indices.iter().zip(sample_indices).enumerate() {
            for b in 0..bands {
                counts[[row, b]] = self.cube.decode(self.cube.element_index(line, b, sample));
            }
        }
        Ok(self.calibrator.calibrate(counts.view(), sample_indices)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::write_cube;
    use approx::assert_relative_eq;
    use hyspexrad_envi::testing::{encode, sidecar_text, HeaderSpec};
    use tempfile::TempDir;

    #[test]
    fn test_logical_indexing_matches_across_interleaves() {
        for interleave in [Interleave::Bil, Interleave::Bip, Interleave::Bsq] {
            let dir = TempDir::new().unwrap();
            let spec = HeaderSpec::default();
            let path = write_cube(&dir, &spec, 4, 4, interleave);
            let file = HyspexFile::open(&path).unwrap();
            let cube = file.cube();

            assert_eq!(cube.dims().lines, 4);
            for l in 0..4 {
                for b in 0..3 {
                    for s in 0..2 {
                        let expected = (l * 100 + b * 10 + s) as f32;
                        assert_relative_eq!(cube.value(l, b, s).unwrap(), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn test_line_count_corrected_from_file_size() {
        let dir = TempDir::new().unwrap();
        let spec = HeaderSpec::default();
        // File holds 6 lines; header claims 9.
        let path = write_cube(&dir, &spec, 6, 9, Interleave::Bil);
        let file = HyspexFile::open(&path).unwrap();
        assert_eq!(file.cube().dims().lines, 6);
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let spec = HeaderSpec::default();
        let path = write_cube(&dir, &spec, 4, 4, Interleave::Bil);
        // Rewrite the sidecar with a band count the binary header
        // does not declare.
        let preamble_len = encode(&spec).len();
        let text = sidecar_text(4, 2, 5, "bil", 12, preamble_len);
        std::fs::write(dir.path().join("scene.hdr"), text).unwrap();
        assert!(matches!(
            HyspexFile::open(&path),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_unknown_interleave_rejected() {
        let dir = TempDir::new().unwrap();
        let spec = HeaderSpec::default();
        let path = write_cube(&dir, &spec, 2, 2, Interleave::Bil);
        let preamble_len = encode(&spec).len();
        let text = sidecar_text(2, 2, 3, "bilinear", 12, preamble_len);
        std::fs::write(dir.path().join("scene.hdr"), text).unwrap();
        assert!(HyspexFile::open(&path).is_err());
    }

    #[test]
    fn test_value_out_of_bounds() {
        let dir = TempDir::new().unwrap();
        let spec = HeaderSpec::default();
        let path = write_cube(&dir, &spec, 2, 2, Interleave::Bil);
        let file = HyspexFile::open(&path).unwrap();
        let result = file.cube().value(0, 0, 2);
        assert!(matches!(
            result,
            Err(Error::Core(CoreError::OutOfBounds { axis: "sample", .. }))
        ));
    }

    #[test]
    fn test_calibrated_cube_pixel_set() {
        let dir = TempDir::new().unwrap();
        let spec = HeaderSpec::default();
        let path = write_cube(&dir, &spec, 4, 4, Interleave::Bil);
        let file = HyspexFile::open(&path).unwrap();
        let calibrated = CalibratedCube::new(&file).unwrap();

        // Pixels (0, 0), (0, 1) and (3, 0).
        let radiance = calibrated.calibrate(&[0, 0, 3], &[0, 1, 0]).unwrap();
        assert_eq!(radiance.dim(), (3, 3));

        // Raw count for (line 3, band 0, sample 0) is 300; background 10,
        // response 1.
        let tables = calibrated.calibrator().tables();
        let expected = (300.0 - 10.0) / tables.denominator()[[0, 0]];
        assert_relative_eq!(radiance[[2, 0]], expected, max_relative = 1e-6);
    }

    #[test]
    fn test_calibrate_line_out_of_bounds() {
        let dir = TempDir::new().unwrap();
        let spec = HeaderSpec::default();
        let path = write_cube(&dir, &spec, 2, 2, Interleave::Bil);
        let file = HyspexFile::open(&path).unwrap();
        let calibrated = CalibratedCube::new(&file).unwrap();
        assert!(calibrated.calibrate(&[5], &[0]).is_err());
    }
}
