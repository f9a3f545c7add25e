//! Forward error correction: reconstructing missing source packets from
//! repair packets within a block (spec §4.5).
//!
//! If FEC support is disabled in a session's `ServerConfig` options, this
//! stage is simply never inserted into the pipeline; the upstream audio
//! reader is used directly, the same passthrough degrade the original
//! falls back to when built without OpenFEC.

mod decoder;
mod stage;

pub use decoder::{BlockDecoder, FecError, ReedSolomonBlockDecoder};
pub use stage::FecDecoderStage;
