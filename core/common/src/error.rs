//! Common error types for Skyshelf.

use thiserror::Error;

/// Top-level error type for storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials are missing, malformed, or were rejected by the provider.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The provider could not be reached or failed mid-request.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object or directory does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error means the target is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
