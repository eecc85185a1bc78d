//! Persistence layer
//!
//! `store` is the storage interface (upserts scoped to a transaction,
//! reset, diagnostics), `writer` the per-activity transactional writer,
//! `watermark` the latest-only high-water marks.

pub mod store;
pub mod watermark;
pub mod writer;

pub use writer::{PersistenceWriter, WriteMode};
