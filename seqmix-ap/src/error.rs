//! Error types for seqmix-ap
//!
//! The offline path is fail-fast: any of these aborts the whole composition.
//! The live path logs per-segment `Decode` / `SourceUnavailable` failures and
//! keeps the session moving; only `AudioOutput` at graph initialization is
//! session-fatal.

use thiserror::Error;

/// Main error type for seqmix-ap
#[derive(Error, Debug)]
pub enum Error {
    /// A placeholder segment has no bound upload (raised before any decode)
    #[error("Missing upload for placeholder '{0}'")]
    MissingUpload(String),

    /// Source bytes could not be fetched
    #[error("Source unavailable: {url}: {reason}")]
    SourceUnavailable { url: String, reason: String },

    /// The decoder failed on a source
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// A segment's asset is absent at compose time
    #[error("Asset resolution error: {0}")]
    AssetResolution(String),

    /// Assets do not share the target sample rate
    #[error("Sample rate mismatch for {source_key}: expected {expected} Hz, found {found} Hz")]
    SampleRateMismatch {
        source_key: String,
        expected: u32,
        found: u32,
    },

    /// The batch render step failed (invalid plan, allocation failure, size limits)
    #[error("Render error: {0}")]
    Render(String),

    /// The WAV writer rejected the output
    #[error("WAV encode error: {0}")]
    Wav(#[from] hound::Error),

    /// Output graph or device error
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Operation not valid in the current scheduler state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Template, config or catalog errors from seqmix-common
    #[error(transparent)]
    Common(#[from] seqmix_common::Error),
}

/// Convenience Result type using seqmix-ap Error
pub type Result<T> = std::result::Result<T, Error>;
