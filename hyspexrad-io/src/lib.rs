//! File access for HySpex cubes: memory-mapped raw cubes, calibrated
//! views, bounded-memory line streaming, and quantized chunk output.

pub mod cube;
mod error;
pub mod sink;
pub mod stream;

#[cfg(test)]
mod test_fixtures;

pub use cube::{CalibratedCube, HyspexFile, RawCube};
pub use error::{Error, Result};
pub use sink::{sidecar_meta, ChunkSink, QuantizedChunkWriter, SidecarMeta};
pub use stream::{StreamChunk, StreamConfig, StreamingLineReader};
