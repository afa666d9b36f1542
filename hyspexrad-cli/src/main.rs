//!
//! Command-line conversion of HySpex cubes to calibrated radiance.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand};

use hyspexrad_cal::{quantize_auto, quantize_fixed, DEFAULT_SUB_CHUNK, DEFAULT_TOLERANCE};
use hyspexrad_io::{
    sidecar_meta, ChunkSink, HyspexFile, QuantizedChunkWriter, StreamConfig, StreamingLineReader,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file error: {0}")]
    HyspexIo(#[from] hyspexrad_io::Error),

    #[error("calibration error: {0}")]
    Cal(#[from] hyspexrad_cal::Error),

    #[error("core error: {0}")]
    Core(#[from] hyspexrad_core::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

/// HySpex hyperspectral cube calibration and conversion.
#[derive(Parser)]
#[command(name = "hyspexrad")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header information for .hyspex files
    Info {
        /// Input .hyspex file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,
    },

    /// Convert .hyspex files to quantized radiance chunks
    Convert {
        /// Input .hyspex file(s)
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// First line to convert (inclusive)
        #[arg(long, default_value = "0")]
        start_line: usize,

        /// Last line to convert (inclusive; defaults to the last line)
        #[arg(long)]
        end_line: Option<usize>,

        /// Lines per chunk (defaults to a memory-derived size)
        #[arg(long)]
        chunk_lines: Option<usize>,

        /// Write raw counts instead of calibrated radiance
        #[arg(long)]
        raw: bool,

        /// Quantization scale factor (value = integer * scale)
        #[arg(long, default_value = "1e-6")]
        scale_factor: f64,

        /// Search the first chunk for a power-of-ten scale instead of
        /// using --scale-factor
        #[arg(long)]
        auto_scale: bool,

        /// Ceiling for the automatic power-of-ten scale search
        #[arg(long, default_value = "1000000")]
        max_scale: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Info { input } => {
            for path in &input {
                print_info(path)?;
            }
        }

        Commands::Convert {
            input,
            output_dir,
            start_line,
            end_line,
            chunk_lines,
            raw,
            scale_factor,
            auto_scale,
            max_scale,
        } => {
            if !(scale_factor.is_finite() && scale_factor > 0.0) {
                return Err(CliError::Usage(format!(
                    "scale factor must be finite and positive, got {scale_factor}"
                )));
            }
            std::fs::create_dir_all(&output_dir)?;

            let start = Instant::now();
            let options = ConvertOptions {
                output_dir,
                start_line,
                end_line,
                chunk_lines,
                raw,
                scale_factor,
                auto_scale,
                max_scale,
                verbose: cli.verbose,
            };

            let results: Vec<Result<usize>> = input
                .par_iter()
                .map(|path| convert_file(path, &options))
                .collect();

            let mut total_rows = 0usize;
            let mut failures = 0usize;
            for (path, result) in input.iter().zip(results) {
                match result {
                    Ok(rows) => total_rows += rows,
                    Err(e) => {
                        failures += 1;
                        eprintln!("{}: {e}", path.display());
                    }
                }
            }

            let elapsed = start.elapsed();
            println!(
                "Converted {} of {} files in {:.2}s",
                input.len() - failures,
                input.len(),
                elapsed.as_secs_f64()
            );
            println!("Total rows: {}", total_rows);
            if failures > 0 {
                return Err(CliError::Usage(format!("{failures} file(s) failed")));
            }
        }
    }

    Ok(())
}

fn print_info(path: &Path) -> Result<()> {
    let file = HyspexFile::open(path)?;
    let file_size = std::fs::metadata(path)?.len();
    let dims = file.cube().dims();
    let binary = file.binary();

    let wavelengths = &binary.spectral_calib;
    let wavelength_range = if wavelengths.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::json!([wavelengths[0], wavelengths[wavelengths.len() - 1]])
    };

    let summary = serde_json::json!({
        "path": path.display().to_string(),
        "file_size_bytes": file_size,
        "lines": dims.lines,
        "samples": dims.samples,
        "bands": dims.bands,
        "dtype": format!("{:?}", file.cube().dtype()),
        "interleave": file.cube().interleave().to_string(),
        "serial_number": binary.serial_number,
        "sensor": binary.sensor.clone(),
        "integration_time_us": binary.integration_time,
        "calibration_available": binary.calib_available != 0,
        "wavelength_range_nm": wavelength_range,
        "bad_pixels": binary.bad_pixels.len(),
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

struct ConvertOptions {
    output_dir: PathBuf,
    start_line: usize,
    end_line: Option<usize>,
    chunk_lines: Option<usize>,
    raw: bool,
    scale_factor: f64,
    auto_scale: bool,
    max_scale: u32,
    verbose: bool,
}

/// Converts one cube, returning the number of rows written.
fn convert_file(path: &Path, options: &ConvertOptions) -> Result<usize> {
    // Open once up front to resolve the default end line from the
    // file-size-corrected line count.
    let lines = HyspexFile::open(path)?.cube().dims().lines;
    if lines == 0 {
        return Err(CliError::Usage(format!("{} holds no lines", path.display())));
    }
    let end_line = options.end_line.unwrap_or(lines - 1);

    let mut config = StreamConfig::new(options.start_line, end_line)
        .with_calibrate(!options.raw)
        .with_log_interval(if options.verbose { 500 } else { 0 });
    if let Some(chunk) = options.chunk_lines {
        config = config.with_chunk_lines(chunk);
    }

    let mut reader = StreamingLineReader::open(path, &config)?;
    let dims = reader.file().cube().dims();
    let wavelengths = reader.wavelengths().clone();

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cube");
    let out_path = options.output_dir.join(format!("{stem}.i32"));
    let mut writer = QuantizedChunkWriter::create(&out_path, dims.bands)?;

    if options.verbose {
        eprintln!("{} -> {}", path.display(), out_path.display());
    }

    // With --auto-scale the first chunk picks a power-of-ten scale that
    // the rest of the stream reuses, so one sidecar scale factor
    // describes the whole file.
    let mut scale_factor = if options.auto_scale {
        None
    } else {
        Some(options.scale_factor)
    };
    let mut rows_written = 0usize;

    while let Some(chunk) = reader.next_chunk() {
        let chunk = chunk?;
        let values = chunk
            .as_slice()
            .map_or_else(|| chunk.iter().copied().collect(), <[f32]>::to_vec);

        let scale = match scale_factor {
            Some(scale) => scale,
            None => {
                let (_, auto) = quantize_auto(&values, options.max_scale, DEFAULT_TOLERANCE)?;
                let scale = 1.0 / f64::from(auto);
                scale_factor = Some(scale);
                scale
            }
        };

        let quantized = quantize_fixed(&values, scale, DEFAULT_SUB_CHUNK)?;
        writer.write_chunk(&quantized, chunk.nrows())?;
        rows_written += chunk.nrows();
    }

    let meta = sidecar_meta(
        rows_written,
        dims.samples,
        &wavelengths,
        scale_factor.unwrap_or(options.scale_factor),
    );
    writer.finish(&meta)?;

    if options.verbose {
        eprintln!("  {} rows written", rows_written);
    }
    Ok(rows_written)
}
