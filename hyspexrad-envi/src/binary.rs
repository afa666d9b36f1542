//! HySpex binary preamble parser.
//!
//! The first `header offset` bytes of a .hyspex file are a fixed-layout
//! little-endian record: an 8-byte `HYSPEX` magic word, a run of scalar
//! fields, and three arrays whose lengths are given by scalar fields
//! decoded earlier in the same record (`spectral_size`, `spatial_size`,
//! `nobp`). Decoding is strictly sequential; every offset depends on all
//! preceding fields having been consumed.

use crate::{Error, Result};
use ndarray::{Array1, Array2};

/// Forward-only little-endian byte cursor.
///
/// All reads advance the cursor; there is no seek. This keeps the
/// data-dependent field ordering impossible to get wrong at a call site.
struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(Error::Truncated {
            offset: self.pos,
            needed: len,
            available: 0,
        })?;
        if end > self.buf.len() {
            return Err(Error::Truncated {
                offset: self.pos,
                needed: len,
                available: self.buf.len() - self.pos,
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.take(8)?;
        Ok(f64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }

    /// Reads a fixed-width latin-1 string, trimming trailing NUL padding.
    fn read_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        let trimmed = match bytes.iter().position(|&b| b == 0) {
            Some(end) => &bytes[..end],
            None => bytes,
        };
        // latin-1: every byte maps directly to the same code point
        Ok(trimmed.iter().map(|&b| char::from(b)).collect())
    }

    fn read_f64_array(&mut self, count: usize) -> Result<Vec<f64>> {
        let bytes = self.take(count * 8)?;
        Ok(bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().expect("8-byte chunk")))
            .collect())
    }

    fn read_u32_array(&mut self, count: usize) -> Result<Vec<u32>> {
        let bytes = self.take(count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().expect("4-byte chunk")))
            .collect())
    }
}

/// Decoded HySpex binary preamble.
///
/// Field order matches the on-disk layout. Scalar fields are kept even
/// where the calibration pipeline does not use them; the record is the
/// complete sensor state at acquisition time.
#[derive(Debug, Clone)]
pub struct HyspexHeader {
    pub size: i32,
    pub serial_number: u32,
    pub configfile: String,
    pub settingfile: String,
    pub scaling_factor: f64,
    pub electronics: u32,
    pub comsettings_electronics: u32,
    pub comport_electronics: String,
    pub fanspeed: u32,
    pub backtemperature: u32,
    pub comport: String,
    pub detectstring: String,
    pub sensor: String,
    pub framegrabber: String,
    pub id: String,
    pub supplier: String,
    pub left_gain: String,
    pub right_gain: String,
    pub comment: String,
    pub backgroundfile: String,
    pub record_hd: String,
    pub unknown_ptr1: u32,
    pub serverindex: u32,
    pub comsettings: u32,
    pub number_of_background: u32,
    /// Spectral band count; length basis for `spectral_calib` and `qe`.
    pub spectral_size: u32,
    /// Cross-track sample count; with `spectral_size`, length basis for
    /// `re` and `background_before`.
    pub spatial_size: u32,
    pub binning: u32,
    pub detected: u32,
    /// Integration time in microseconds.
    pub integration_time: u32,
    pub frame_period: u32,
    pub default_r: u32,
    pub default_g: u32,
    pub default_b: u32,
    pub bitshift: u32,
    pub temperature_offset: u32,
    pub shutter: u32,
    pub background_present: u32,
    pub power: u32,
    pub current: u32,
    pub bias: u32,
    pub bandwidth: u32,
    pub vin: u32,
    pub vref: u32,
    pub sensor_vin: u32,
    pub sensor_vref: u32,
    pub cooling_temperature: u32,
    pub window_start: u32,
    pub window_stop: u32,
    pub readout_time: u32,
    pub p: u32,
    pub i: u32,
    pub d: u32,
    pub numberofframes: u32,
    /// Bad-pixel count; length basis for `bad_pixels`.
    pub nobp: u32,
    pub dw: u32,
    pub eq: u32,
    pub lens: u32,
    pub fovexp: u32,
    pub scanning_mode: u32,
    /// Nonzero when the record carries usable calibration data.
    pub calib_available: u32,
    pub number_of_avg: u32,
    /// DN per photoelectron.
    pub sf: f64,
    pub aperture_size: f64,
    pub pixelsize_x: f64,
    pub pixelsize_y: f64,
    pub temperature: f64,
    pub max_framerate: f64,
    pub spectral_calib_pointer: u32,
    pub re_pointer: u32,
    pub qe_pointer: u32,
    pub background_pointer: u32,
    pub bad_pixels_pointer: u32,
    pub image_format: u32,
    /// Wavelength centers in nm, length `spectral_size`.
    pub spectral_calib: Array1<f64>,
    /// Quantum efficiency of the center pixel, length `spectral_size`.
    pub qe: Array1<f64>,
    /// Response matrix, shape [spectral_size, spatial_size].
    pub re: Array2<f64>,
    /// Background matrix, shape [spectral_size, spatial_size].
    pub background_before: Array2<f64>,
    /// Bad-pixel indices, length `nobp`.
    pub bad_pixels: Vec<u32>,
}

impl HyspexHeader {
    /// Parses the binary preamble of a .hyspex file.
    ///
    /// The magic word is checked before anything else is decoded.
    ///
    /// # Errors
    /// Returns [`Error::BadMagic`] if the first 8 bytes are not `HYSPEX`,
    /// or [`Error::Truncated`] if the buffer ends before a declared field
    /// or array is complete. No partial record is returned.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cur = ByteCursor::new(data);

        let magic = cur.read_string(8)?;
        if magic != "HYSPEX" {
            return Err(Error::BadMagic(magic));
        }

        let size = cur.read_i32()?;
        let serial_number = cur.read_u32()?;
        let configfile = cur.read_string(200)?;
        let settingfile = cur.read_string(120)?;
        let scaling_factor = cur.read_f64()?;
        let electronics = cur.read_u32()?;
        let comsettings_electronics = cur.read_u32()?;
        let comport_electronics = cur.read_string(56)?;
        let fanspeed = cur.read_u32()?;
        let backtemperature = cur.read_u32()?;
        let comport = cur.read_string(64)?;
        let detectstring = cur.read_string(200)?;
        let sensor = cur.read_string(200)?;
        let framegrabber = cur.read_string(200)?;
        let id = cur.read_string(200)?;
        let supplier = cur.read_string(200)?;
        let left_gain = cur.read_string(32)?;
        let right_gain = cur.read_string(32)?;
        let comment = cur.read_string(200)?;
        let backgroundfile = cur.read_string(200)?;
        let record_hd = cur.read_string(1)?;
        let unknown_ptr1 = cur.read_u32()?;
        let serverindex = cur.read_u32()?;
        let comsettings = cur.read_u32()?;
        let number_of_background = cur.read_u32()?;
        let spectral_size = cur.read_u32()?;
        let spatial_size = cur.read_u32()?;
        let binning = cur.read_u32()?;
        let detected = cur.read_u32()?;
        let integration_time = cur.read_u32()?;
        let frame_period = cur.read_u32()?;
        let default_r = cur.read_u32()?;
        let default_g = cur.read_u32()?;
        let default_b = cur.read_u32()?;
        let bitshift = cur.read_u32()?;
        let temperature_offset = cur.read_u32()?;
        let shutter = cur.read_u32()?;
        let background_present = cur.read_u32()?;
        let power = cur.read_u32()?;
        let current = cur.read_u32()?;
        let bias = cur.read_u32()?;
        let bandwidth = cur.read_u32()?;
        let vin = cur.read_u32()?;
        let vref = cur.read_u32()?;
        let sensor_vin = cur.read_u32()?;
        let sensor_vref = cur.read_u32()?;
        let cooling_temperature = cur.read_u32()?;
        let window_start = cur.read_u32()?;
        let window_stop = cur.read_u32()?;
        let readout_time = cur.read_u32()?;
        let p = cur.read_u32()?;
        let i = cur.read_u32()?;
        let d = cur.read_u32()?;
        let numberofframes = cur.read_u32()?;
        let nobp = cur.read_u32()?;
        let dw = cur.read_u32()?;
        let eq = cur.read_u32()?;
        let lens = cur.read_u32()?;
        let fovexp = cur.read_u32()?;
        let scanning_mode = cur.read_u32()?;
        let calib_available = cur.read_u32()?;
        let number_of_avg = cur.read_u32()?;
        let sf = cur.read_f64()?;
        let aperture_size = cur.read_f64()?;
        let pixelsize_x = cur.read_f64()?;
        let pixelsize_y = cur.read_f64()?;
        let temperature = cur.read_f64()?;
        let max_framerate = cur.read_f64()?;
        let spectral_calib_pointer = cur.read_u32()?;
        let re_pointer = cur.read_u32()?;
        let qe_pointer = cur.read_u32()?;
        let background_pointer = cur.read_u32()?;
        let bad_pixels_pointer = cur.read_u32()?;
        let image_format = cur.read_u32()?;

        // Array lengths come from scalars decoded above; the order of the
        // reads below is part of the wire format.
        let bands = spectral_size as usize;
        let samples = spatial_size as usize;
        let spectral_calib = Array1::from_vec(cur.read_f64_array(bands)?);
        let qe = Array1::from_vec(cur.read_f64_array(bands)?);
        let re = Array2::from_shape_vec((bands, samples), cur.read_f64_array(bands * samples)?)
            .map_err(|e| Error::ParseError(format!("response matrix reshape: {e}")))?;
        let background_before =
            Array2::from_shape_vec((bands, samples), cur.read_f64_array(bands * samples)?)
                .map_err(|e| Error::ParseError(format!("background matrix reshape: {e}")))?;
        let bad_pixels = cur.read_u32_array(nobp as usize)?;

        Ok(Self {
            size,
            serial_number,
            configfile,
            settingfile,
            scaling_factor,
            electronics,
            comsettings_electronics,
            comport_electronics,
            fanspeed,
            backtemperature,
            comport,
            detectstring,
            sensor,
            framegrabber,
            id,
            supplier,
            left_gain,
            right_gain,
            comment,
            backgroundfile,
            record_hd,
            unknown_ptr1,
            serverindex,
            comsettings,
            number_of_background,
            spectral_size,
            spatial_size,
            binning,
            detected,
            integration_time,
            frame_period,
            default_r,
            default_g,
            default_b,
            bitshift,
            temperature_offset,
            shutter,
            background_present,
            power,
            current,
            bias,
            bandwidth,
            vin,
            vref,
            sensor_vin,
            sensor_vref,
            cooling_temperature,
            window_start,
            window_stop,
            readout_time,
            p,
            i,
            d,
            numberofframes,
            nobp,
            dw,
            eq,
            lens,
            fovexp,
            scanning_mode,
            calib_available,
            number_of_avg,
            sf,
            aperture_size,
            pixelsize_x,
            pixelsize_y,
            temperature,
            max_framerate,
            spectral_calib_pointer,
            re_pointer,
            qe_pointer,
            background_pointer,
            bad_pixels_pointer,
            image_format,
            spectral_calib,
            qe,
            re,
            background_before,
            bad_pixels,
        })
    }

    /// True when the record carries usable calibration data.
    #[must_use]
    pub fn calibration_available(&self) -> bool {
        self.calib_available != 0
    }
}
