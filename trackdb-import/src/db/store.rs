//! Storage interface
//!
//! Free functions over the activity schema. Upserts are scoped to a
//! transaction owned by the persistence writer so one activity commits
//! atomically. Activity rows key on `activity_id`; device, file, and
//! device-info rows key on their natural keys and merge fields
//! (`COALESCE`) since they are shared reference data populated
//! incrementally across many activities.

use crate::models::record_set::{
    Activity, DeviceFields, ExtensionFields, ExtensionKind, Lap, Record,
};
use crate::models::SourceFile;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

type Tx<'a> = Transaction<'a, Sqlite>;

/// Upsert the activity row.
///
/// `merge` selects extend semantics: present incoming fields win, absent
/// ones keep the stored value. Without it the incoming row replaces the
/// stored one field-for-field.
pub async fn upsert_activity(
    tx: &mut Tx<'_>,
    activity: &Activity,
    merge: bool,
) -> Result<(), sqlx::Error> {
    let update = if merge {
        r#"
            name = COALESCE(excluded.name, name),
            description = COALESCE(excluded.description, description),
            type = COALESCE(excluded.type, type),
            sport = COALESCE(excluded.sport, sport),
            sub_sport = COALESCE(excluded.sub_sport, sub_sport),
            start_time = COALESCE(excluded.start_time, start_time),
            stop_time = COALESCE(excluded.stop_time, stop_time),
            elapsed_time = COALESCE(excluded.elapsed_time, elapsed_time),
            moving_time = COALESCE(excluded.moving_time, moving_time),
            distance = COALESCE(excluded.distance, distance),
            laps = COALESCE(excluded.laps, laps),
            calories = COALESCE(excluded.calories, calories),
            avg_hr = COALESCE(excluded.avg_hr, avg_hr),
            max_hr = COALESCE(excluded.max_hr, max_hr),
            avg_speed = COALESCE(excluded.avg_speed, avg_speed),
            max_speed = COALESCE(excluded.max_speed, max_speed),
            avg_temperature = COALESCE(excluded.avg_temperature, avg_temperature),
            start_lat = COALESCE(excluded.start_lat, start_lat),
            start_long = COALESCE(excluded.start_long, start_long),
            stop_lat = COALESCE(excluded.stop_lat, stop_lat),
            stop_long = COALESCE(excluded.stop_long, stop_long)
        "#
    } else {
        r#"
            name = excluded.name,
            description = excluded.description,
            type = excluded.type,
            sport = excluded.sport,
            sub_sport = excluded.sub_sport,
            start_time = excluded.start_time,
            stop_time = excluded.stop_time,
            elapsed_time = excluded.elapsed_time,
            moving_time = excluded.moving_time,
            distance = excluded.distance,
            laps = excluded.laps,
            calories = excluded.calories,
            avg_hr = excluded.avg_hr,
            max_hr = excluded.max_hr,
            avg_speed = excluded.avg_speed,
            max_speed = excluded.max_speed,
            avg_temperature = excluded.avg_temperature,
            start_lat = excluded.start_lat,
            start_long = excluded.start_long,
            stop_lat = excluded.stop_lat,
            stop_long = excluded.stop_long
        "#
    };

    let sql = format!(
        r#"
        INSERT INTO activities (
            activity_id, name, description, type, sport, sub_sport,
            start_time, stop_time, elapsed_time, moving_time, distance, laps,
            calories, avg_hr, max_hr, avg_speed, max_speed, avg_temperature,
            start_lat, start_long, stop_lat, stop_long
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(activity_id) DO UPDATE SET {}
        "#,
        update
    );

    sqlx::query(&sql)
        .bind(&activity.activity_id)
        .bind(&activity.name)
        .bind(&activity.description)
        .bind(&activity.activity_type)
        .bind(activity.sport.as_ref().map(|s| s.as_str().to_string()))
        .bind(&activity.sub_sport)
        .bind(activity.start_time)
        .bind(activity.stop_time)
        .bind(activity.elapsed_time)
        .bind(activity.moving_time)
        .bind(activity.distance)
        .bind(activity.laps.map(i64::from))
        .bind(activity.calories.map(i64::from))
        .bind(activity.avg_hr.map(i64::from))
        .bind(activity.max_hr.map(i64::from))
        .bind(activity.avg_speed)
        .bind(activity.max_speed)
        .bind(activity.avg_temperature)
        .bind(activity.start_lat)
        .bind(activity.start_long)
        .bind(activity.stop_lat)
        .bind(activity.stop_long)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Remove an activity's laps and records ahead of re-insertion.
///
/// Children are fully replaced on re-import rather than merged, so a
/// corrected source file leaves no stale rows behind.
pub async fn delete_children(tx: &mut Tx<'_>, activity_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM activity_records WHERE activity_id = ?")
        .bind(activity_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM activity_laps WHERE activity_id = ?")
        .bind(activity_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn upsert_lap(tx: &mut Tx<'_>, activity_id: &str, lap: &Lap) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO activity_laps (
            activity_id, lap, start_time, stop_time, elapsed_time, moving_time,
            distance, calories, avg_hr, max_hr, avg_speed, max_speed,
            start_lat, start_long
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(activity_id, lap) DO UPDATE SET
            start_time = excluded.start_time,
            stop_time = excluded.stop_time,
            elapsed_time = excluded.elapsed_time,
            moving_time = excluded.moving_time,
            distance = excluded.distance,
            calories = excluded.calories,
            avg_hr = excluded.avg_hr,
            max_hr = excluded.max_hr,
            avg_speed = excluded.avg_speed,
            max_speed = excluded.max_speed,
            start_lat = excluded.start_lat,
            start_long = excluded.start_long
        "#,
    )
    .bind(activity_id)
    .bind(i64::from(lap.lap))
    .bind(lap.start_time)
    .bind(lap.stop_time)
    .bind(lap.elapsed_time)
    .bind(lap.moving_time)
    .bind(lap.distance)
    .bind(lap.calories.map(i64::from))
    .bind(lap.avg_hr.map(i64::from))
    .bind(lap.max_hr.map(i64::from))
    .bind(lap.avg_speed)
    .bind(lap.max_speed)
    .bind(lap.start_lat)
    .bind(lap.start_long)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn upsert_record(
    tx: &mut Tx<'_>,
    activity_id: &str,
    record: &Record,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO activity_records (
            activity_id, record, timestamp, position_lat, position_long,
            distance, altitude, hr, cadence, speed, temperature
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(activity_id, record) DO UPDATE SET
            timestamp = excluded.timestamp,
            position_lat = excluded.position_lat,
            position_long = excluded.position_long,
            distance = excluded.distance,
            altitude = excluded.altitude,
            hr = excluded.hr,
            cadence = excluded.cadence,
            speed = excluded.speed,
            temperature = excluded.temperature
        "#,
    )
    .bind(activity_id)
    .bind(i64::from(record.record))
    .bind(record.timestamp)
    .bind(record.position_lat)
    .bind(record.position_long)
    .bind(record.distance)
    .bind(record.altitude)
    .bind(record.hr.map(i64::from))
    .bind(record.cadence.map(i64::from))
    .bind(record.speed)
    .bind(record.temperature)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Upsert the extension row in the table matching the activity's sport.
pub async fn upsert_extension(
    tx: &mut Tx<'_>,
    activity_id: &str,
    kind: ExtensionKind,
    ext: &ExtensionFields,
    merge: bool,
) -> Result<(), sqlx::Error> {
    match kind {
        ExtensionKind::Steps => {
            let update = if merge {
                r#"
                    steps = COALESCE(excluded.steps, steps),
                    avg_pace = COALESCE(excluded.avg_pace, avg_pace),
                    avg_moving_pace = COALESCE(excluded.avg_moving_pace, avg_moving_pace),
                    max_pace = COALESCE(excluded.max_pace, max_pace),
                    avg_steps_per_min = COALESCE(excluded.avg_steps_per_min, avg_steps_per_min),
                    max_steps_per_min = COALESCE(excluded.max_steps_per_min, max_steps_per_min),
                    avg_step_length = COALESCE(excluded.avg_step_length, avg_step_length),
                    avg_vertical_oscillation = COALESCE(excluded.avg_vertical_oscillation, avg_vertical_oscillation),
                    avg_ground_contact_time = COALESCE(excluded.avg_ground_contact_time, avg_ground_contact_time)
                "#
            } else {
                r#"
                    steps = excluded.steps,
                    avg_pace = excluded.avg_pace,
                    avg_moving_pace = excluded.avg_moving_pace,
                    max_pace = excluded.max_pace,
                    avg_steps_per_min = excluded.avg_steps_per_min,
                    max_steps_per_min = excluded.max_steps_per_min,
                    avg_step_length = excluded.avg_step_length,
                    avg_vertical_oscillation = excluded.avg_vertical_oscillation,
                    avg_ground_contact_time = excluded.avg_ground_contact_time
                "#
            };
            let sql = format!(
                r#"
                INSERT INTO steps_activities (
                    activity_id, steps, avg_pace, avg_moving_pace, max_pace,
                    avg_steps_per_min, max_steps_per_min, avg_step_length,
                    avg_vertical_oscillation, avg_ground_contact_time
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(activity_id) DO UPDATE SET {}
                "#,
                update
            );
            sqlx::query(&sql)
                .bind(activity_id)
                .bind(ext.steps.map(i64::from))
                .bind(ext.avg_pace)
                .bind(ext.avg_moving_pace)
                .bind(ext.max_pace)
                .bind(ext.avg_steps_per_min.map(i64::from))
                .bind(ext.max_steps_per_min.map(i64::from))
                .bind(ext.avg_step_length)
                .bind(ext.avg_vertical_oscillation)
                .bind(ext.avg_ground_contact_time)
                .execute(&mut **tx)
                .await?;
        }
        ExtensionKind::Paddle => {
            let update = if merge {
                r#"
                    strokes = COALESCE(excluded.strokes, strokes),
                    avg_stroke_distance = COALESCE(excluded.avg_stroke_distance, avg_stroke_distance),
                    avg_strokes_per_min = COALESCE(excluded.avg_strokes_per_min, avg_strokes_per_min),
                    max_strokes_per_min = COALESCE(excluded.max_strokes_per_min, max_strokes_per_min)
                "#
            } else {
                r#"
                    strokes = excluded.strokes,
                    avg_stroke_distance = excluded.avg_stroke_distance,
                    avg_strokes_per_min = excluded.avg_strokes_per_min,
                    max_strokes_per_min = excluded.max_strokes_per_min
                "#
            };
            let sql = format!(
                r#"
                INSERT INTO paddle_activities (
                    activity_id, strokes, avg_stroke_distance,
                    avg_strokes_per_min, max_strokes_per_min
                )
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(activity_id) DO UPDATE SET {}
                "#,
                update
            );
            sqlx::query(&sql)
                .bind(activity_id)
                .bind(ext.strokes.map(i64::from))
                .bind(ext.avg_stroke_distance)
                .bind(ext.avg_strokes_per_min.map(i64::from))
                .bind(ext.max_strokes_per_min.map(i64::from))
                .execute(&mut **tx)
                .await?;
        }
        ExtensionKind::Cycle => {
            let update = if merge {
                r#"
                    strokes = COALESCE(excluded.strokes, strokes),
                    avg_rpms = COALESCE(excluded.avg_rpms, avg_rpms),
                    max_rpms = COALESCE(excluded.max_rpms, max_rpms)
                "#
            } else {
                r#"
                    strokes = excluded.strokes,
                    avg_rpms = excluded.avg_rpms,
                    max_rpms = excluded.max_rpms
                "#
            };
            let sql = format!(
                r#"
                INSERT INTO cycle_activities (activity_id, strokes, avg_rpms, max_rpms)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(activity_id) DO UPDATE SET {}
                "#,
                update
            );
            sqlx::query(&sql)
                .bind(activity_id)
                .bind(ext.strokes.map(i64::from))
                .bind(ext.avg_rpms.map(i64::from))
                .bind(ext.max_rpms.map(i64::from))
                .execute(&mut **tx)
                .await?;
        }
        ExtensionKind::Elliptical => {
            let update = if merge {
                r#"
                    steps = COALESCE(excluded.steps, steps),
                    strokes = COALESCE(excluded.strokes, strokes),
                    avg_rpms = COALESCE(excluded.avg_rpms, avg_rpms),
                    max_rpms = COALESCE(excluded.max_rpms, max_rpms)
                "#
            } else {
                r#"
                    steps = excluded.steps,
                    strokes = excluded.strokes,
                    avg_rpms = excluded.avg_rpms,
                    max_rpms = excluded.max_rpms
                "#
            };
            let sql = format!(
                r#"
                INSERT INTO elliptical_activities (activity_id, steps, strokes, avg_rpms, max_rpms)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(activity_id) DO UPDATE SET {}
                "#,
                update
            );
            sqlx::query(&sql)
                .bind(activity_id)
                .bind(ext.steps.map(i64::from))
                .bind(ext.strokes.map(i64::from))
                .bind(ext.avg_rpms.map(i64::from))
                .bind(ext.max_rpms.map(i64::from))
                .execute(&mut **tx)
                .await?;
        }
    }

    Ok(())
}

/// Remove extension rows from every table except the one matching the
/// activity's sport. A re-import that corrects the sport must not leave
/// the old table populated.
pub async fn clear_other_extensions(
    tx: &mut Tx<'_>,
    activity_id: &str,
    keep: ExtensionKind,
) -> Result<(), sqlx::Error> {
    for kind in ExtensionKind::ALL {
        if kind == keep {
            continue;
        }
        let sql = format!("DELETE FROM {} WHERE activity_id = ?", kind.table_name());
        sqlx::query(&sql)
            .bind(activity_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub async fn upsert_device(tx: &mut Tx<'_>, device: &DeviceFields) -> Result<(), sqlx::Error> {
    let serial = match device.serial_number {
        Some(serial) => serial,
        None => return Ok(()),
    };

    sqlx::query(
        r#"
        INSERT INTO devices (serial_number, manufacturer, product, hardware_version, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(serial_number) DO UPDATE SET
            manufacturer = COALESCE(excluded.manufacturer, manufacturer),
            product = COALESCE(excluded.product, product),
            hardware_version = COALESCE(excluded.hardware_version, hardware_version),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(serial)
    .bind(&device.manufacturer)
    .bind(&device.product)
    .bind(&device.hardware_version)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn upsert_device_info(
    tx: &mut Tx<'_>,
    device: &DeviceFields,
    file_id: &str,
) -> Result<(), sqlx::Error> {
    let (serial, timestamp) = match (device.serial_number, device.timestamp) {
        (Some(serial), Some(timestamp)) => (serial, timestamp),
        _ => return Ok(()),
    };

    sqlx::query(
        r#"
        INSERT INTO device_info (serial_number, timestamp, file_id, software_version, battery_status)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(serial_number, timestamp) DO UPDATE SET
            file_id = COALESCE(excluded.file_id, file_id),
            software_version = COALESCE(excluded.software_version, software_version),
            battery_status = COALESCE(excluded.battery_status, battery_status)
        "#,
    )
    .bind(serial)
    .bind(timestamp)
    .bind(file_id)
    .bind(&device.software_version)
    .bind(&device.battery_status)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Upsert the source-file inventory row, keyed on path. Returns the file
/// row's id. At most one row exists per distinct source file.
pub async fn upsert_file(
    tx: &mut Tx<'_>,
    source: &SourceFile,
    serial_number: Option<i64>,
) -> Result<String, sqlx::Error> {
    let name = source.path.display().to_string();

    sqlx::query(
        r#"
        INSERT INTO files (id, name, type, serial_number, hash, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            serial_number = COALESCE(excluded.serial_number, serial_number),
            hash = COALESCE(excluded.hash, hash),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&name)
    .bind(source.format.as_str())
    .bind(serial_number)
    .bind(&source.hash)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    let id: String = sqlx::query_scalar("SELECT id FROM files WHERE name = ?")
        .bind(&name)
        .fetch_one(&mut **tx)
        .await?;

    Ok(id)
}

/// Whole-database reset: every core table emptied, children first so no
/// orphaned rows survive even with foreign keys off.
pub async fn delete_all(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for table in [
        "activity_records",
        "activity_laps",
        "steps_activities",
        "paddle_activities",
        "cycle_activities",
        "elliptical_activities",
        "activities",
        "device_info",
        "files",
        "devices",
        "import_watermarks",
    ] {
        let sql = format!("DELETE FROM {}", table);
        sqlx::query(&sql).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Row count diagnostic. The table name is validated against the known
/// schema, never interpolated from caller data.
pub async fn row_count(pool: &SqlitePool, table: &str) -> Result<i64, sqlx::Error> {
    if !trackdb_common::db::CORE_TABLES.contains(&table) {
        return Err(sqlx::Error::Protocol(format!("unknown table: {}", table)));
    }
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    sqlx::query_scalar(&sql).fetch_one(pool).await
}

/// Startup validation of the sport → extension-table registry: every
/// enumerated table must exist in the schema.
pub async fn validate_extension_registry(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for kind in ExtensionKind::ALL {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(kind.table_name())
        .fetch_optional(pool)
        .await?;
        if found.is_none() {
            return Err(sqlx::Error::Protocol(format!(
                "missing extension table: {}",
                kind.table_name()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackdb_common::db::init_memory_database;

    fn activity(id: &str, sport: &str) -> Activity {
        Activity {
            activity_id: id.to_string(),
            sport: Some(crate::models::Sport::from_str(sport)),
            distance: Some(10.0),
            ..Activity::default()
        }
    }

    #[tokio::test]
    async fn activity_upsert_is_idempotent() {
        let pool = init_memory_database().await.unwrap();

        for _ in 0..2 {
            let mut tx = pool.begin().await.unwrap();
            upsert_activity(&mut tx, &activity("a1", "running"), false)
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let count = row_count(&pool, "activities").await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn merge_upsert_keeps_existing_fields() {
        let pool = init_memory_database().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let mut full = activity("a1", "running");
        full.name = Some("Morning Run".to_string());
        upsert_activity(&mut tx, &full, false).await.unwrap();

        // Extend pass carries no name; stored name must survive
        let sparse = Activity {
            activity_id: "a1".to_string(),
            calories: Some(300),
            ..Activity::default()
        };
        upsert_activity(&mut tx, &sparse, true).await.unwrap();
        tx.commit().await.unwrap();

        let (name, calories): (Option<String>, Option<i64>) = sqlx::query_as(
            "SELECT name, calories FROM activities WHERE activity_id = 'a1'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(name.as_deref(), Some("Morning Run"));
        assert_eq!(calories, Some(300));
    }

    #[tokio::test]
    async fn clear_other_extensions_enforces_single_row() {
        let pool = init_memory_database().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        upsert_activity(&mut tx, &activity("a1", "running"), false)
            .await
            .unwrap();
        upsert_extension(
            &mut tx,
            "a1",
            ExtensionKind::Steps,
            &ExtensionFields::default(),
            false,
        )
        .await
        .unwrap();
        // Sport corrected to cycling on re-import
        clear_other_extensions(&mut tx, "a1", ExtensionKind::Cycle)
            .await
            .unwrap();
        upsert_extension(
            &mut tx,
            "a1",
            ExtensionKind::Cycle,
            &ExtensionFields::default(),
            false,
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(row_count(&pool, "steps_activities").await.unwrap(), 0);
        assert_eq!(row_count(&pool, "cycle_activities").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn file_rows_are_unique_per_path() {
        let pool = init_memory_database().await.unwrap();
        let source = SourceFile {
            path: std::path::PathBuf::from("/import/run.tlm"),
            format: crate::models::FileFormat::Telemetry,
            hash: Some("abc123".to_string()),
        };

        let mut tx = pool.begin().await.unwrap();
        let first = upsert_file(&mut tx, &source, Some(77)).await.unwrap();
        let second = upsert_file(&mut tx, &source, Some(77)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(row_count(&pool, "files").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn row_count_rejects_unknown_table() {
        let pool = init_memory_database().await.unwrap();
        assert!(row_count(&pool, "users; DROP TABLE activities").await.is_err());
    }

    #[tokio::test]
    async fn registry_validates_against_schema() {
        let pool = init_memory_database().await.unwrap();
        validate_extension_registry(&pool).await.unwrap();

        sqlx::query("DROP TABLE paddle_activities")
            .execute(&pool)
            .await
            .unwrap();
        assert!(validate_extension_registry(&pool).await.is_err());
    }
}
