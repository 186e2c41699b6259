//! Error types for the scene persistence engine.
//!
//! These errors stay inside the engine. Public entry points turn them into a
//! log record and a `false` / empty return.

use thiserror::Error;

/// Main error type for scene-mirror operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File or folder does not exist in the store
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Host unreachable, refused or dropped the connection
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Authentication was rejected by the server
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// An outstanding remote request was cancelled
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// Write permission pre-check failed
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A connection operation was attempted before `initialize`
    #[error("Connection is not initialized")]
    NotInitialized,

    /// Persisted document could not be decoded
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Voxel grid payload could not be decoded
    #[error("Invalid voxel grid: {0}")]
    InvalidGrid(String),

    /// Data type not supported for the requested attribute or grid
    #[error("Unsupported data type: {0}")]
    UnsupportedType(String),

    /// Write operation failed
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid document error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    /// Create an unsupported type error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedType(msg.into())
    }
}

/// Result type alias for scene-mirror operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::NotInitialized;
        assert!(e.to_string().contains("not initialized"));

        let e = Error::unsupported("uint64 generic array");
        assert!(e.to_string().contains("uint64"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
