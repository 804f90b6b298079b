//! Error types for perspective-sql.

use thiserror::Error;

/// The main error type for schema conversion and acquisition.
#[derive(Debug, Error)]
pub enum PerspectiveError {
    /// The document does not have the minimal expected shape.
    #[error("Malformed schema: {0}")]
    MalformedSchema(String),

    /// The schema file or perspective could not be found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller may not read the schema.
    #[error("Permission denied: {0}")]
    AccessDenied(String),

    /// The API rejected the key.
    #[error("Invalid API key. Please check your CloudHealth API key.")]
    InvalidCredential,

    /// The API did not answer in time.
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Any other HTTP failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The bytes were not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PerspectiveError {
    /// Create a malformed schema error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedSchema(message.into())
    }

    /// True for failures that happen before the core sees a document.
    pub fn is_acquisition(&self) -> bool {
        !matches!(self, Self::MalformedSchema(_) | Self::Config(_))
    }
}

/// Result type alias for perspective-sql operations.
pub type PerspectiveResult<T> = Result<T, PerspectiveError>;
