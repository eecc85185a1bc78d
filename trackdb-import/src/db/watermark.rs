//! Latest-only high-water marks
//!
//! One mark per (directory, format) pair: the newest modification time
//! (milliseconds since epoch) among successfully committed files. Loaded
//! at batch start, advanced in memory as transactions commit, persisted
//! at batch end — never touched mid-transaction.

use crate::models::FileFormat;
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::Path;

/// Load the stored mark for a source, if any.
pub async fn load(
    pool: &SqlitePool,
    directory: &Path,
    format: FileFormat,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT newest_mtime FROM import_watermarks WHERE directory = ? AND format = ?",
    )
    .bind(directory.display().to_string())
    .bind(format.as_str())
    .fetch_optional(pool)
    .await
}

/// Persist a mark, keeping whichever of the stored and offered values is
/// newer. Marks only move forward.
pub async fn store(
    pool: &SqlitePool,
    directory: &Path,
    format: FileFormat,
    newest_mtime: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO import_watermarks (directory, format, newest_mtime, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(directory, format) DO UPDATE SET
            newest_mtime = MAX(newest_mtime, excluded.newest_mtime),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(directory.display().to_string())
    .bind(format.as_str())
    .bind(newest_mtime)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}
