//! Import orchestrator
//!
//! Wires selector → decoder → normalizer → writer per file:
//!
//! 1. Enumerate candidate files once, up front (sequential, so the
//!    high-water mark sees a deterministic order).
//! 2. Process files on a bounded pool of concurrent tasks, each walking
//!    `Discovered → Decoding → Decoded → Normalizing → Normalized →
//!    Writing → Committed` or stopping in a terminal failure state.
//! 3. Aggregate per-file outcomes into a [`BatchResult`]. One file's
//!    failure never aborts the batch; only a connection-level storage
//!    failure does.
//!
//! Cancellation stops dispatching new files; in-flight transactions
//! finish atomically.

use crate::db::{store, watermark, writer, PersistenceWriter, WriteMode};
use crate::decoders;
use crate::error::{ImportError, ImportResult};
use crate::models::batch::{BatchResult, FileFailure, FileState, ImportStage};
use crate::models::{FileFormat, SourceFile};
use crate::services::{file_selector, unit_normalizer};
use futures::stream::{FuturesUnordered, StreamExt};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trackdb_common::config::ImportConfig;

/// One import source: a directory of files in a single wire format.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub directory: PathBuf,
    pub format: FileFormat,
    /// Restrict to files newer than the stored high-water mark
    pub latest_only: bool,
}

impl SourceDescriptor {
    pub fn new(directory: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            directory: directory.into(),
            format,
            latest_only: false,
        }
    }

    pub fn latest_only(mut self, latest_only: bool) -> Self {
        self.latest_only = latest_only;
        self
    }
}

/// Pipeline entry points: `file_count`, `process`, `delete`.
pub struct ImportOrchestrator {
    pool: SqlitePool,
    config: ImportConfig,
    writer: PersistenceWriter,
}

enum FileOutcome {
    Committed { mtime: Option<i64> },
    Skipped,
    Failed(FileFailure),
    Fatal(ImportError),
}

impl ImportOrchestrator {
    /// Build an orchestrator. Validates the sport → extension-table
    /// registry against the live schema before accepting any work.
    pub async fn new(pool: SqlitePool, config: ImportConfig) -> ImportResult<Self> {
        store::validate_extension_registry(&pool)
            .await
            .map_err(|e| ImportError::Config(e.to_string()))?;

        let writer = PersistenceWriter::new(pool.clone(), config.detached_details);
        Ok(Self {
            pool,
            config,
            writer,
        })
    }

    /// Number of files a `process` call over this source would visit.
    /// No decode, no write.
    pub async fn file_count(&self, source: &SourceDescriptor) -> ImportResult<usize> {
        let newer_than = self.resolve_mark(source).await?;
        match file_selector::count(&source.directory, source.format, newer_than) {
            Ok(count) => Ok(count),
            Err(ImportError::EmptyInput(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Process every selected file in the source.
    pub async fn process(&self, source: &SourceDescriptor) -> ImportResult<BatchResult> {
        self.process_with_cancel(source, CancellationToken::new())
            .await
    }

    /// `process` with an external cancellation token. Cancelling stops
    /// dispatch of new files; in-flight transactions run to completion.
    pub async fn process_with_cancel(
        &self,
        source: &SourceDescriptor,
        cancel: CancellationToken,
    ) -> ImportResult<BatchResult> {
        let newer_than = self.resolve_mark(source).await?;

        let selection =
            match file_selector::enumerate(&source.directory, source.format, newer_than) {
                Ok(selection) => selection,
                Err(ImportError::EmptyInput(reason)) => {
                    // Nothing matched: zero-result success
                    debug!(reason = %reason, "Nothing to import");
                    return Ok(BatchResult::default());
                }
                Err(e) => return Err(e),
            };

        let mut result = BatchResult::new(selection.files.len() + selection.skipped);
        result.skipped = selection.skipped;

        info!(
            directory = %source.directory.display(),
            format = source.format.as_str(),
            files = selection.files.len(),
            latest_only = source.latest_only,
            "Starting import batch"
        );

        let mode = match source.format {
            FileFormat::JsonDetails => WriteMode::Extend,
            _ => WriteMode::Replace,
        };
        let timeout = Duration::from_secs(self.config.file_timeout_secs);

        let mut pending = selection.files.into_iter();
        let mut in_flight = FuturesUnordered::new();
        let mut newest_committed: Option<i64> = None;
        let mut fatal: Option<ImportError> = None;

        loop {
            while fatal.is_none()
                && !cancel.is_cancelled()
                && in_flight.len() < self.config.concurrency
            {
                match pending.next() {
                    Some(path) => {
                        in_flight.push(self.process_file(path, source.format, mode, timeout))
                    }
                    None => break,
                }
            }

            match in_flight.next().await {
                Some(FileOutcome::Committed { mtime }) => {
                    result.committed += 1;
                    // High-water mark advances only on commit
                    if let Some(mtime) = mtime {
                        newest_committed = Some(newest_committed.map_or(mtime, |m| m.max(mtime)));
                    }
                }
                Some(FileOutcome::Skipped) => result.skipped += 1,
                Some(FileOutcome::Failed(failure)) => result.failed.push(failure),
                Some(FileOutcome::Fatal(err)) => {
                    // Stop dispatching; already-started transactions are
                    // drained so none is interrupted mid-commit
                    fatal.get_or_insert(err);
                }
                None => break,
            }
        }

        if let Some(err) = fatal {
            warn!(error = %err, "Batch aborted by storage failure");
            return Err(err);
        }

        if cancel.is_cancelled() {
            info!("Batch cancelled; undispatched files left for the next run");
        }

        if let Some(newest) = newest_committed {
            if let Err(e) =
                watermark::store(&self.pool, &source.directory, source.format, newest).await
            {
                warn!(error = %e, "Failed to persist high-water mark");
            }
        }

        info!(
            committed = result.committed,
            skipped = result.skipped,
            failed = result.failed.len(),
            "Import batch finished"
        );

        Ok(result)
    }

    /// Whole-database reset: every table emptied, used for test and
    /// reprocess-from-scratch flows.
    pub async fn delete(&self) -> ImportResult<()> {
        store::delete_all(&self.pool)
            .await
            .map_err(ImportError::from_sqlx)?;
        info!("Deleted all imported data");
        Ok(())
    }

    /// Row count diagnostic over a core table.
    pub async fn row_count(&self, table: &str) -> ImportResult<i64> {
        store::row_count(&self.pool, table)
            .await
            .map_err(ImportError::from_sqlx)
    }

    async fn resolve_mark(&self, source: &SourceDescriptor) -> ImportResult<Option<i64>> {
        if !source.latest_only {
            return Ok(None);
        }
        watermark::load(&self.pool, &source.directory, source.format)
            .await
            .map_err(ImportError::from_sqlx)
    }

    /// One file through the per-file state machine.
    async fn process_file(
        &self,
        path: PathBuf,
        format: FileFormat,
        mode: WriteMode,
        timeout: Duration,
    ) -> FileOutcome {
        debug!(path = %path.display(), state = ?FileState::Discovered, "Processing file");

        let work = async {
            debug!(path = %path.display(), state = ?FileState::Decoding, "Decoding");
            let mut set = decoders::decode(&path, format)?;
            debug!(
                path = %path.display(),
                state = ?FileState::Decoded,
                activity_id = %set.activity.activity_id,
                "Decoded"
            );

            debug!(path = %path.display(), state = ?FileState::Normalizing, "Normalizing");
            unit_normalizer::normalize(&mut set, self.config.measurement_system);
            debug!(path = %path.display(), state = ?FileState::Normalized, "Normalized");

            let mut source = SourceFile::new(path.clone(), format);
            source.hash = writer::hash_file(&path).ok();

            debug!(path = %path.display(), state = ?FileState::Writing, "Writing");
            self.writer.write(&set, &source, mode).await?;
            Ok::<_, ImportError>(())
        };

        let timed = tokio::time::timeout(timeout, work).await;
        let outcome = match timed {
            Ok(Ok(())) => {
                debug!(path = %path.display(), state = ?FileState::Committed, "Committed");
                let mtime = file_selector::mtime_millis(&path).ok();
                return FileOutcome::Committed { mtime };
            }
            Ok(Err(err)) => err,
            Err(_) => {
                warn!(path = %path.display(), "File processing timed out");
                return FileOutcome::Failed(FileFailure {
                    path,
                    stage: ImportStage::Write,
                    cause: format!("timed out after {}s", timeout.as_secs()),
                });
            }
        };

        match outcome {
            ImportError::EmptyInput(reason) => {
                debug!(path = %path.display(), state = ?FileState::Skipped, reason = %reason, "Empty input");
                FileOutcome::Skipped
            }
            ImportError::UnsupportedVariant(reason) => {
                warn!(path = %path.display(), state = ?FileState::Skipped, reason = %reason, "Unsupported variant");
                FileOutcome::Skipped
            }
            err @ ImportError::StorageUnavailable(_) => FileOutcome::Fatal(err),
            err @ (ImportError::Decode { .. } | ImportError::Io(_)) => {
                warn!(path = %path.display(), state = ?FileState::DecodeFailed, error = %err, "Decode failed");
                FileOutcome::Failed(FileFailure {
                    path,
                    stage: ImportStage::Decode,
                    cause: err.to_string(),
                })
            }
            err => {
                warn!(path = %path.display(), state = ?FileState::WriteFailed, error = %err, "Write failed");
                FileOutcome::Failed(FileFailure {
                    path,
                    stage: ImportStage::Write,
                    cause: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackdb_common::db::init_memory_database;

    async fn orchestrator() -> ImportOrchestrator {
        let pool = init_memory_database().await.unwrap();
        ImportOrchestrator::new(pool, ImportConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_directory_is_zero_result_success() {
        let orch = orchestrator().await;
        let source = SourceDescriptor::new("/nonexistent/import", FileFormat::Exchange);

        assert_eq!(orch.file_count(&source).await.unwrap(), 0);
        let result = orch.process(&source).await.unwrap();
        assert_eq!(result.discovered, 0);
        assert_eq!(result.committed, 0);
        assert!(result.failed.is_empty());
    }

    #[tokio::test]
    async fn registry_mismatch_fails_construction() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("DROP TABLE elliptical_activities")
            .execute(&pool)
            .await
            .unwrap();

        let result = ImportOrchestrator::new(pool, ImportConfig::default()).await;
        assert!(matches!(result, Err(ImportError::Config(_))));
    }

    #[tokio::test]
    async fn cancelled_batch_dispatches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{\"activityId\": 1}").unwrap();

        let orch = orchestrator().await;
        let source = SourceDescriptor::new(dir.path(), FileFormat::JsonSummary);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orch.process_with_cancel(&source, cancel).await.unwrap();
        assert_eq!(result.discovered, 1);
        assert_eq!(result.committed, 0);
        assert!(result.failed.is_empty());
    }
}
