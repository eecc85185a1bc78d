//! Data models for the import pipeline

pub mod batch;
pub mod record_set;
pub mod source;

pub use batch::{BatchResult, FileFailure, FileState, ImportStage};
pub use record_set::{
    Activity, DeviceFields, ExtensionFields, ExtensionKind, Lap, Record, RecordSet, Sport,
};
pub use source::{FileFormat, SourceFile};
