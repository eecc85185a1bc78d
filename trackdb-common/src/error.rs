//! Shared error type for the trackdb crates
//!
//! Covers the concerns trackdb-common owns: database bootstrap and
//! configuration resolution. The import pipeline has its own richer
//! taxonomy in trackdb-import.

use thiserror::Error;

/// Result type for trackdb-common operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
