//! Shared infrastructure for the trackdb workspace
//!
//! Error type, configuration resolution, and database bootstrap used by
//! the import pipeline.

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
