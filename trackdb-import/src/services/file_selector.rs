//! Candidate file selection
//!
//! Enumerates a source directory for files matching a format's extension
//! (and, for telemetry, its magic bytes), in a deterministic
//! lexicographic order so repeated runs visit files identically. With a
//! high-water mark, the selection is restricted to files strictly newer
//! than the mark — the latest-only incremental mode.
//!
//! Selection never decodes and never writes; `count` is safe for
//! pre-flight checks.

use crate::decoders::telemetry;
use crate::error::{ImportError, ImportResult};
use crate::models::FileFormat;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome of one enumeration pass.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Matching files, lexicographically sorted
    pub files: Vec<PathBuf>,
    /// Files present in the directory but not matching the format
    pub skipped: usize,
}

/// Enumerate candidate files for a format.
///
/// `newer_than` is a modification marker in milliseconds since the epoch;
/// files at or below it are filtered out.
pub fn enumerate(
    directory: &Path,
    format: FileFormat,
    newer_than: Option<i64>,
) -> ImportResult<Selection> {
    if !directory.is_dir() {
        return Err(ImportError::EmptyInput(format!(
            "no such directory: {}",
            directory.display()
        )));
    }

    let mut selection = Selection::default();

    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();

        if !format.matches_extension(&path) {
            selection.skipped += 1;
            continue;
        }
        // Telemetry files are additionally verified by magic bytes, so a
        // mislabeled file is skipped instead of failing its decode
        if format == FileFormat::Telemetry && !telemetry::sniff(&path) {
            debug!(path = %path.display(), "Extension matches but magic does not, skipping");
            selection.skipped += 1;
            continue;
        }

        if let Some(mark) = newer_than {
            match mtime_millis(&path) {
                Ok(mtime) if mtime <= mark => continue,
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), "Cannot read mtime: {}", e);
                    continue;
                }
            }
        }

        selection.files.push(path);
    }

    selection.files.sort();
    Ok(selection)
}

/// Size of the selection, without decoding or writing.
pub fn count(directory: &Path, format: FileFormat, newer_than: Option<i64>) -> ImportResult<usize> {
    Ok(enumerate(directory, format, newer_than)?.files.len())
}

/// Modification time in milliseconds since the epoch.
pub fn mtime_millis(path: &Path) -> std::io::Result<i64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let duration = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(duration.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn enumeration_is_sorted_and_filtered_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.axf", b"<Lap/>");
        touch(dir.path(), "a.axf", b"<Lap/>");
        touch(dir.path(), "c.json", b"{}");
        touch(dir.path(), "notes.txt", b"hi");

        let selection = enumerate(dir.path(), FileFormat::Exchange, None).unwrap();
        let names: Vec<_> = selection
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.axf", "b.axf"]);
        assert_eq!(selection.skipped, 2);
    }

    #[test]
    fn telemetry_requires_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut good = Vec::new();
        good.extend_from_slice(&telemetry::TELEMETRY_MAGIC.to_le_bytes());
        good.extend_from_slice(&[1, 0, 0, 0, 0, 0]);
        touch(dir.path(), "real.tlm", &good);
        touch(dir.path(), "fake.tlm", b"not telemetry at all");

        let selection = enumerate(dir.path(), FileFormat::Telemetry, None).unwrap();
        assert_eq!(selection.files.len(), 1);
        assert!(selection.files[0].ends_with("real.tlm"));
        assert_eq!(selection.skipped, 1);
    }

    #[test]
    fn newer_than_filters_older_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = touch(dir.path(), "old.json", b"{}");
        std::thread::sleep(std::time::Duration::from_millis(50));
        let mid = touch(dir.path(), "mid.json", b"{}");
        std::thread::sleep(std::time::Duration::from_millis(50));
        touch(dir.path(), "new.json", b"{}");

        let _ = mtime_millis(&old).unwrap();
        let mark = mtime_millis(&mid).unwrap();

        let selection = enumerate(dir.path(), FileFormat::JsonSummary, Some(mark)).unwrap();
        assert_eq!(selection.files.len(), 1);
        assert!(selection.files[0].ends_with("new.json"));
    }

    #[test]
    fn count_matches_enumeration() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.json", b"{}");
        touch(dir.path(), "b.json", b"{}");

        assert_eq!(count(dir.path(), FileFormat::JsonDetails, None).unwrap(), 2);
    }

    #[test]
    fn missing_directory_is_empty_input() {
        let result = enumerate(Path::new("/nonexistent/source"), FileFormat::Exchange, None);
        assert!(matches!(result, Err(ImportError::EmptyInput(_))));
    }
}
