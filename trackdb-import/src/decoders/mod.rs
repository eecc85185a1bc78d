//! Format decoders
//!
//! One decoder per wire format. Each turns a source file into a
//! [`RecordSet`](crate::models::RecordSet) tagged metric — the wire
//! formats all carry metric values; statute conversion happens in the
//! unit normalizer afterwards.

pub mod exchange;
pub mod json_activity;
pub mod telemetry;

use crate::error::ImportResult;
use crate::models::{FileFormat, RecordSet};
use std::path::Path;

/// Decode a source file according to its format.
pub fn decode(path: &Path, format: FileFormat) -> ImportResult<RecordSet> {
    match format {
        FileFormat::Telemetry => telemetry::decode(path),
        FileFormat::Exchange => exchange::decode(path),
        FileFormat::JsonSummary => json_activity::decode_summary(path),
        FileFormat::JsonDetails => json_activity::decode_details(path),
    }
}
