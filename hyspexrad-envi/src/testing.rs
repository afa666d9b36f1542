//! Synthetic header fixtures shared by the parsing, calibration, and
//! streaming tests. Not part of the public API surface; enabled through
//! the `test-util` feature for sibling crates' dev-dependencies.

/// Fields of the synthetic binary header that tests care about;
/// everything else is zeroed.
pub struct HeaderSpec {
    pub spectral_size: u32,
    pub spatial_size: u32,
    pub nobp: u32,
    pub integration_time: u32,
    pub calib_available: u32,
    pub sf: f64,
    pub aperture_size: f64,
    pub pixelsize_x: f64,
    pub pixelsize_y: f64,
    pub wavelengths: Vec<f64>,
    pub qe: Vec<f64>,
    pub re: Vec<f64>,
    pub background: Vec<f64>,
}

impl Default for HeaderSpec {
    fn default() -> Self {
        let bands = 3;
        let samples = 2;
        Self {
            spectral_size: bands,
            spatial_size: samples,
            nobp: 0,
            integration_time: 20_000,
            calib_available: 1,
            sf: 5.0,
            aperture_size: 0.009,
            pixelsize_x: 6.5e-6,
            pixelsize_y: 6.5e-6,
            wavelengths: vec![400.0, 500.0, 600.0],
            qe: vec![0.5, 0.6, 0.7],
            re: vec![1.0; (bands * samples) as usize],
            background: vec![10.0; (bands * samples) as usize],
        }
    }
}

fn push_string(out: &mut Vec<u8>, text: &str, width: usize) {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(width, 0);
    out.extend_from_slice(&bytes);
}

/// Encodes a syntactically valid binary preamble from the spec.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn encode(spec: &HeaderSpec) -> Vec<u8> {
    let mut out = Vec::new();
    push_string(&mut out, "HYSPEX", 8);
    out.extend_from_slice(&0i32.to_le_bytes()); // size
    out.extend_from_slice(&845u32.to_le_bytes()); // serial_number
    push_string(&mut out, "config.cfg", 200);
    push_string(&mut out, "settings.set", 120);
    out.extend_from_slice(&1.0f64.to_le_bytes()); // scaling_factor
    for _ in 0..2 {
        out.extend_from_slice(&0u32.to_le_bytes()); // electronics, comsettings_electronics
    }
    push_string(&mut out, "COM1", 56);
    for _ in 0..2 {
        out.extend_from_slice(&0u32.to_le_bytes()); // fanspeed, backtemperature
    }
    push_string(&mut out, "COM2", 64);
    push_string(&mut out, "detect", 200);
    push_string(&mut out, "VNIR-1800", 200);
    push_string(&mut out, "grabber", 200);
    push_string(&mut out, "id", 200);
    push_string(&mut out, "supplier", 200);
    push_string(&mut out, "1x", 32);
    push_string(&mut out, "1x", 32);
    push_string(&mut out, "comment", 200);
    push_string(&mut out, "bg.hyspex", 200);
    push_string(&mut out, "1", 1); // record_hd
    for _ in 0..4 {
        // unknown_ptr1, serverindex, comsettings, number_of_background
        out.extend_from_slice(&0u32.to_le_bytes());
    }
    out.extend_from_slice(&spec.spectral_size.to_le_bytes());
    out.extend_from_slice(&spec.spatial_size.to_le_bytes());
    for _ in 0..2 {
        out.extend_from_slice(&0u32.to_le_bytes()); // binning, detected
    }
    out.extend_from_slice(&spec.integration_time.to_le_bytes());
    for _ in 0..24 {
        // frame_period .. numberofframes
        out.extend_from_slice(&0u32.to_le_bytes());
    }
    out.extend_from_slice(&spec.nobp.to_le_bytes());
    for _ in 0..5 {
        out.extend_from_slice(&0u32.to_le_bytes()); // dw, eq, lens, fovexp, scanning_mode
    }
    out.extend_from_slice(&spec.calib_available.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // number_of_avg
    out.extend_from_slice(&spec.sf.to_le_bytes());
    out.extend_from_slice(&spec.aperture_size.to_le_bytes());
    out.extend_from_slice(&spec.pixelsize_x.to_le_bytes());
    out.extend_from_slice(&spec.pixelsize_y.to_le_bytes());
    out.extend_from_slice(&20.0f64.to_le_bytes()); // temperature
    out.extend_from_slice(&100.0f64.to_le_bytes()); // max_framerate
    for _ in 0..6 {
        // five array pointers + image_format
        out.extend_from_slice(&0u32.to_le_bytes());
    }
    for v in &spec.wavelengths {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in &spec.qe {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in &spec.re {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in &spec.background {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for _ in 0..spec.nobp {
        out.extend_from_slice(&0u32.to_le_bytes());
    }
    out
}

/// Renders a minimal ENVI sidecar for a cube fixture.
#[must_use]
pub fn sidecar_text(
    lines: usize,
    samples: usize,
    bands: usize,
    interleave: &str,
    dtype_code: u32,
    header_offset: usize,
) -> String {
    format!(
        "ENVI\n\
         samples = {samples}\n\
         lines = {lines}\n\
         bands = {bands}\n\
         header offset = {header_offset}\n\
         data type = {dtype_code}\n\
         interleave = {interleave}\n"
    )
}
