//! Per-activity transactional writer
//!
//! One transaction per record set: the activity row, all laps, all
//! records, the single extension row, and the device/file inventory
//! commit together or not at all. Any write failure rolls the whole
//! activity back and is reported to the batch.

use crate::db::store;
use crate::error::{ImportError, ImportResult};
use crate::models::record_set::{ExtensionKind, RecordSet, Sport};
use crate::models::SourceFile;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info, warn};
use trackdb_common::config::DetachedDetailsPolicy;

/// How a record set maps onto rows already stored for its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Re-import of a complete source: the stored activity and all its
    /// children are replaced
    Replace,
    /// Second pass over the same logical activity (JSON details after
    /// summary): header fields merge, incoming children replace stored
    /// ones
    Extend,
}

/// Transactional writer over the activity store.
pub struct PersistenceWriter {
    pool: SqlitePool,
    detached_details: DetachedDetailsPolicy,
}

impl PersistenceWriter {
    pub fn new(pool: SqlitePool, detached_details: DetachedDetailsPolicy) -> Self {
        Self {
            pool,
            detached_details,
        }
    }

    /// Commit one record set. Upsert-by-identifier: re-writing an
    /// already-stored activity replaces it without duplicating rows.
    pub async fn write(
        &self,
        set: &RecordSet,
        source: &SourceFile,
        mode: WriteMode,
    ) -> ImportResult<()> {
        let activity_id = set.activity.activity_id.as_str();

        check_record_order(set);

        let mut tx = self.pool.begin().await.map_err(ImportError::from_sqlx)?;

        if mode == WriteMode::Extend && self.detached_details == DetachedDetailsPolicy::Reject {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM activities WHERE activity_id = ?")
                    .bind(activity_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(ImportError::from_sqlx)?;
            if exists.is_none() {
                return Err(ImportError::Write(format!(
                    "details for activity {} with no imported summary",
                    activity_id
                )));
            }
        }

        store::upsert_activity(&mut tx, &set.activity, mode == WriteMode::Extend)
            .await
            .map_err(ImportError::from_sqlx)?;

        // Children are replaced wholesale; an extend pass without any
        // incoming children leaves the stored ones alone.
        if mode == WriteMode::Replace || !set.laps.is_empty() || !set.records.is_empty() {
            store::delete_children(&mut tx, activity_id)
                .await
                .map_err(ImportError::from_sqlx)?;
            for lap in &set.laps {
                store::upsert_lap(&mut tx, activity_id, lap)
                    .await
                    .map_err(ImportError::from_sqlx)?;
            }
            for record in &set.records {
                store::upsert_record(&mut tx, activity_id, record)
                    .await
                    .map_err(ImportError::from_sqlx)?;
            }
        }

        // Extension placement follows the merged row's sport, not just
        // this pass's: a details pass without a sport tag must not move
        // the extension row out of the summary's table.
        let stored_sport: Option<String> =
            sqlx::query_scalar("SELECT sport FROM activities WHERE activity_id = ?")
                .bind(activity_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(ImportError::from_sqlx)?;
        let kind = stored_sport
            .as_deref()
            .map(|s| Sport::from_str(s).extension_kind())
            .unwrap_or(ExtensionKind::Steps);

        store::clear_other_extensions(&mut tx, activity_id, kind)
            .await
            .map_err(ImportError::from_sqlx)?;
        store::upsert_extension(
            &mut tx,
            activity_id,
            kind,
            &set.extension,
            mode == WriteMode::Extend,
        )
        .await
        .map_err(ImportError::from_sqlx)?;

        let serial = set.device.as_ref().and_then(|d| d.serial_number);
        let file_id = store::upsert_file(&mut tx, source, serial)
            .await
            .map_err(ImportError::from_sqlx)?;
        if let Some(device) = &set.device {
            store::upsert_device(&mut tx, device)
                .await
                .map_err(ImportError::from_sqlx)?;
            store::upsert_device_info(&mut tx, device, &file_id)
                .await
                .map_err(ImportError::from_sqlx)?;
        }

        tx.commit().await.map_err(ImportError::from_sqlx)?;

        info!(
            activity_id = %activity_id,
            file = %source.path.display(),
            laps = set.laps.len(),
            records = set.records.len(),
            mode = ?mode,
            "Committed activity"
        );

        Ok(())
    }
}

/// SHA-256 of a file's content, hex encoded, for the file inventory.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Record timestamps are expected non-decreasing in decode order. A
/// violation points at a malformed source; it is logged, not fatal.
fn check_record_order(set: &RecordSet) {
    let mut previous = None;
    for record in &set.records {
        if let Some(ts) = record.timestamp {
            if let Some(prev) = previous {
                if ts < prev {
                    warn!(
                        activity_id = %set.activity.activity_id,
                        record = record.record,
                        "Record timestamps regress; source out of order"
                    );
                    return;
                }
            }
            previous = Some(ts);
        }
    }
    debug!(
        activity_id = %set.activity.activity_id,
        records = set.records.len(),
        "Record order verified"
    );
}
