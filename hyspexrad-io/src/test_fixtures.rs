//! On-disk cube fixtures for the io tests.

use hyspexrad_core::Interleave;
use hyspexrad_envi::testing::{encode, sidecar_text, HeaderSpec};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// Writes a .hyspex + .hdr pair with u16 counts laid out per
/// `interleave`; counts[(line, band, sample)] = line*100 + band*10 + sample.
pub(crate) fn write_cube(
    dir: &TempDir,
    spec: &HeaderSpec,
    lines: usize,
    declared_lines: usize,
    interleave: Interleave,
) -> PathBuf {
    let samples = spec.spatial_size as usize;
    let bands = spec.spectral_size as usize;
    let preamble = encode(spec);

    let raw_path = dir.path().join("scene.hyspex");
    let mut raw = std::fs::File::create(&raw_path).unwrap();
    raw.write_all(&preamble).unwrap();

    let value = |l: usize, b: usize, s: usize| -> u16 { (l * 100 + b * 10 + s) as u16 };
    let mut push = |l: usize, b: usize, s: usize| {
        raw.write_all(&value(l, b, s).to_le_bytes()).unwrap();
    };
    match interleave {
        Interleave::Bil => {
            for l in 0..lines {
                for b in 0..bands {
                    for s in 0..samples {
                        push(l, b, s);
                    }
                }
            }
        }
        Interleave::Bip => {
            for l in 0..lines {
                for s in 0..samples {
                    for b in 0..bands {
                        push(l, b, s);
                    }
                }
            }
        }
        Interleave::Bsq => {
            for b in 0..bands {
                for l in 0..lines {
                    for s in 0..samples {
                        push(l, b, s);
                    }
                }
            }
        }
    }
    raw.flush().unwrap();

    let hdr_path = dir.path().join("scene.hdr");
    let text = sidecar_text(
        declared_lines,
        samples,
        bands,
        &interleave.to_string(),
        12,
        preamble.len(),
    );
    std::fs::write(&hdr_path, text).unwrap();
    raw_path
}
