//! Error types for Fieldnotes

use thiserror::Error;

/// Main error type for the observational memory engine
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Text-generation backend failed or was unreachable.
    ///
    /// Never surfaced from `ingest`; the extractor and reflector recover
    /// with their deterministic fallbacks.
    #[error("Backend error: {0}")]
    Backend(String),

    /// HTTP transport error (includes request timeouts)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Token counter could not be constructed
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MemoryError>;
