//! Database initialization
//!
//! Creates the connection pool and the activity schema on first run.
//! Initialization is idempotent; every table is created with
//! `CREATE TABLE IF NOT EXISTS`, so calling it against an existing
//! database is safe.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Core tables created by [`init_database`], in creation order.
///
/// Parent tables precede children so foreign keys resolve.
pub const CORE_TABLES: &[&str] = &[
    "devices",
    "files",
    "device_info",
    "activities",
    "activity_laps",
    "activity_records",
    "steps_activities",
    "paddle_activities",
    "cycle_activities",
    "elliptical_activities",
    "import_watermarks",
];

/// Initialize a file-backed database and create tables if needed.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // rwc mode creates the database file when missing. Pool is sized for
    // the parallel import workers plus the orchestrator itself.
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_pragmas(&pool).await?;
    create_tables(&pool).await?;

    Ok(pool)
}

/// Initialize an in-memory database with the full schema.
///
/// Single-connection pool: each SQLite `:memory:` connection is its own
/// database, so the pool must never hand out a second one.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    configure_pragmas(&pool).await?;
    create_tables(&pool).await?;

    Ok(pool)
}

async fn configure_pragmas(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers with one writer; the import workers
    // write in parallel and serialize only on the transaction commit.
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    Ok(())
}

/// Create every activity table. Idempotent.
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_devices_table(pool).await?;
    create_files_table(pool).await?;
    create_device_info_table(pool).await?;
    create_activities_table(pool).await?;
    create_activity_laps_table(pool).await?;
    create_activity_records_table(pool).await?;
    create_steps_activities_table(pool).await?;
    create_paddle_activities_table(pool).await?;
    create_cycle_activities_table(pool).await?;
    create_elliptical_activities_table(pool).await?;
    create_import_watermarks_table(pool).await?;

    Ok(())
}

async fn create_devices_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            serial_number INTEGER PRIMARY KEY,
            manufacturer TEXT,
            product TEXT,
            hardware_version TEXT,
            updated_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL,
            serial_number INTEGER,
            hash TEXT,
            updated_at TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_device_info_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS device_info (
            serial_number INTEGER NOT NULL REFERENCES devices(serial_number),
            timestamp TIMESTAMP NOT NULL,
            file_id TEXT REFERENCES files(id),
            software_version TEXT,
            battery_status TEXT,
            PRIMARY KEY (serial_number, timestamp)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_activities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activities (
            activity_id TEXT PRIMARY KEY,
            name TEXT,
            description TEXT,
            type TEXT,
            sport TEXT,
            sub_sport TEXT,
            start_time TIMESTAMP,
            stop_time TIMESTAMP,
            elapsed_time REAL,
            moving_time REAL,
            distance REAL,
            laps INTEGER,
            calories INTEGER,
            avg_hr INTEGER,
            max_hr INTEGER,
            avg_speed REAL,
            max_speed REAL,
            avg_temperature REAL,
            start_lat REAL,
            start_long REAL,
            stop_lat REAL,
            stop_long REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_activity_laps_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activity_laps (
            activity_id TEXT NOT NULL REFERENCES activities(activity_id) ON DELETE CASCADE,
            lap INTEGER NOT NULL,
            start_time TIMESTAMP,
            stop_time TIMESTAMP,
            elapsed_time REAL,
            moving_time REAL,
            distance REAL,
            calories INTEGER,
            avg_hr INTEGER,
            max_hr INTEGER,
            avg_speed REAL,
            max_speed REAL,
            start_lat REAL,
            start_long REAL,
            PRIMARY KEY (activity_id, lap)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_activity_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activity_records (
            activity_id TEXT NOT NULL REFERENCES activities(activity_id) ON DELETE CASCADE,
            record INTEGER NOT NULL,
            timestamp TIMESTAMP,
            position_lat REAL,
            position_long REAL,
            distance REAL,
            altitude REAL,
            hr INTEGER,
            cadence INTEGER,
            speed REAL,
            temperature REAL,
            PRIMARY KEY (activity_id, record)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_steps_activities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS steps_activities (
            activity_id TEXT PRIMARY KEY REFERENCES activities(activity_id) ON DELETE CASCADE,
            steps INTEGER,
            avg_pace REAL,
            avg_moving_pace REAL,
            max_pace REAL,
            avg_steps_per_min INTEGER,
            max_steps_per_min INTEGER,
            avg_step_length REAL,
            avg_vertical_oscillation REAL,
            avg_ground_contact_time REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_paddle_activities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS paddle_activities (
            activity_id TEXT PRIMARY KEY REFERENCES activities(activity_id) ON DELETE CASCADE,
            strokes INTEGER,
            avg_stroke_distance REAL,
            avg_strokes_per_min INTEGER,
            max_strokes_per_min INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cycle_activities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cycle_activities (
            activity_id TEXT PRIMARY KEY REFERENCES activities(activity_id) ON DELETE CASCADE,
            strokes INTEGER,
            avg_rpms INTEGER,
            max_rpms INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_elliptical_activities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS elliptical_activities (
            activity_id TEXT PRIMARY KEY REFERENCES activities(activity_id) ON DELETE CASCADE,
            steps INTEGER,
            strokes INTEGER,
            avg_rpms INTEGER,
            max_rpms INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_import_watermarks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_watermarks (
            directory TEXT NOT NULL,
            format TEXT NOT NULL,
            newest_mtime INTEGER NOT NULL,
            updated_at TIMESTAMP,
            PRIMARY KEY (directory, format)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
