//! Source file identification

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Wire format of a source file.
///
/// The two JSON variants are distinct formats from the pipeline's point of
/// view: a summary file and a details file jointly populate one logical
/// activity, so the caller runs one pass per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// Compact binary telemetry (`.tlm`)
    Telemetry,
    /// XML interchange (`.axf`)
    Exchange,
    /// JSON activity summary (`.json`)
    JsonSummary,
    /// JSON per-record details (`.json`)
    JsonDetails,
}

impl FileFormat {
    /// File extension expected for this format, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Telemetry => "tlm",
            FileFormat::Exchange => "axf",
            FileFormat::JsonSummary | FileFormat::JsonDetails => "json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Telemetry => "telemetry",
            FileFormat::Exchange => "exchange",
            FileFormat::JsonSummary => "json_summary",
            FileFormat::JsonDetails => "json_details",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "telemetry" => Some(FileFormat::Telemetry),
            "exchange" => Some(FileFormat::Exchange),
            "json_summary" => Some(FileFormat::JsonSummary),
            "json_details" => Some(FileFormat::JsonDetails),
            _ => None,
        }
    }

    /// Whether a path carries this format's extension.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(self.extension()))
            .unwrap_or(false)
    }
}

/// A selected source file, as handed from the selector to the writer.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub format: FileFormat,
    /// SHA-256 of the file content, hex encoded
    pub hash: Option<String>,
}

impl SourceFile {
    pub fn new(path: PathBuf, format: FileFormat) -> Self {
        Self {
            path,
            format,
            hash: None,
        }
    }
}
