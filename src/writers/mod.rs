//! Encoders for `.dm` and `.details` streams.
//!
//! Encoders validate the whole input before returning bytes, so a failed encode never leaves a
//! partially written file behind.

pub mod chunk;
pub mod details;
pub mod dm;

pub use chunk::ChunkWriter;
