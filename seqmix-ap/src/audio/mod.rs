//! Audio types and processing
//!
//! Decoding and fetching are capabilities supplied from outside the core; this
//! module defines their interfaces alongside the default implementations.

/// Decoder capability and the symphonia implementation
pub mod decoder;
/// Source fetch capability and the filesystem implementation
pub mod loader;
/// Device output via cpal
#[cfg(feature = "device-output")]
pub mod output;
/// Sample-rate conversion using rubato
pub mod resampler;
/// Core PCM types (PcmAsset, PcmBuffer)
pub mod types;
/// RIFF/WAVE container encoder
pub mod wav;

pub use decoder::{Decoder, SymphoniaDecoder};
pub use loader::{FsLoader, SourceLoader};
pub use types::{PcmAsset, PcmBuffer, OUTPUT_CHANNELS};
