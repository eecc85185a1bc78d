//! Error types for the import pipeline
//!
//! Per-file errors (`Decode`, `Write`, `UnsupportedVariant`, `EmptyInput`)
//! are recovered locally: the file is recorded in the batch result and the
//! batch continues. `StorageUnavailable` is the one class that fails the
//! whole batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for import operations
pub type ImportResult<T> = std::result::Result<T, ImportError>;

/// Import pipeline errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// Input holds nothing to import; zero-result success at batch level
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Recognized format, unhandled sub-type; file skipped
    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// Malformed or corrupt payload; file marked failed, batch continues
    #[error("Decode error in {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Storage write failure, transaction rolled back; batch continues
    #[error("Write error: {0}")]
    Write(String),

    /// Connection-level storage failure; fatal to the whole batch
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// I/O failure reading a source file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid pipeline configuration or source descriptor
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ImportError {
    /// Shorthand for decode failures.
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ImportError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classify a storage error: connection-class failures are fatal to
    /// the batch, statement-class failures stay per-file.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_) => {
                ImportError::StorageUnavailable(err.to_string())
            }
            other => ImportError::Write(other.to_string()),
        }
    }

    /// True when the error must abort the whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ImportError::StorageUnavailable(_))
    }
}
