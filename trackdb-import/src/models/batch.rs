//! Per-file import state machine and batch accounting
//!
//! Each file progresses `Discovered → Decoding → Decoded → Normalizing →
//! Normalized → Writing → Committed`, or stops in one of the terminal
//! failure states. No state is revisited within a run; the next run starts
//! every file fresh at `Discovered`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-file import state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Discovered,
    Decoding,
    Decoded,
    DecodeFailed,
    Normalizing,
    Normalized,
    Writing,
    Committed,
    WriteFailed,
    /// Format mismatch or unsupported variant, detected at discovery or
    /// during decode
    Skipped,
}

impl FileState {
    /// Terminal states end a file's processing for the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Committed
                | FileState::DecodeFailed
                | FileState::WriteFailed
                | FileState::Skipped
        )
    }
}

/// Pipeline stage a failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Decode,
    Normalize,
    Write,
}

/// One file's failure, with enough context to re-run just the failed
/// subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub stage: ImportStage,
    pub cause: String,
}

/// Aggregated outcome of one `process` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    /// Files the selector produced for this batch
    pub discovered: usize,
    /// Files whose transaction committed
    pub committed: usize,
    /// Files skipped (format mismatch, unsupported variant, empty input)
    pub skipped: usize,
    /// Per-file failures; never aborts the batch
    pub failed: Vec<FileFailure>,
}

impl BatchResult {
    pub fn new(discovered: usize) -> Self {
        Self {
            discovered,
            ..Default::default()
        }
    }

    /// Every discovered file reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.committed + self.skipped + self.failed.len() == self.discovered
    }
}
