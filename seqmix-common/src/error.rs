//! Common error types for seqmix

use thiserror::Error;

/// Common result type for seqmix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the assembler and player
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Template or config JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file TOML could not be parsed
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Template document failed load-time validation
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
