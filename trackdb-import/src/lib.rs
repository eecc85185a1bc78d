//! trackdb-import: fitness activity import pipeline
//!
//! Decodes device recordings in three wire formats (binary telemetry,
//! XML interchange, JSON summary/details), normalizes units to the
//! configured measurement system, and upserts the result into the
//! activity store. Batches are idempotent: re-running over an unchanged
//! file set leaves the database unchanged.

pub mod db;
pub mod decoders;
pub mod error;
pub mod models;
pub mod services;

pub use error::{ImportError, ImportResult};
pub use models::batch::{BatchResult, FileFailure, ImportStage};
pub use models::record_set::RecordSet;
pub use services::orchestrator::{ImportOrchestrator, SourceDescriptor};
