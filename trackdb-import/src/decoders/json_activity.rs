//! JSON activity decoder
//!
//! Two caller-selected modes over the same logical activity:
//!
//! - **Summary** (`decode_summary`): one object per file holding the
//!   activity header (name, type, sport, times, aggregates).
//! - **Details** (`decode_details`): one object holding ordered `laps`
//!   and `records` arrays keyed to the same `activityId`.
//!
//! Both passes must run to fully populate an activity; the orchestrator
//! writes the details pass in extend mode so it merges with the header
//! the summary pass produced.
//!
//! Wire values are metric (meters, m/s, Celsius) and converted to the
//! pipeline's metric display units (km, kph) here.

use crate::error::{ImportError, ImportResult};
use crate::models::record_set::{
    pace_from_speed, Activity, ExtensionKind, Lap, Record, RecordSet, Sport,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// Decode a summary file: activity header only, no laps or records.
pub fn decode_summary(path: &Path) -> ImportResult<RecordSet> {
    let raw: SummaryFile = read_json(path)?;

    let start_time = raw.start_time.as_deref().and_then(parse_time);
    let activity_id = resolve_id(path, raw.activity_id.as_ref(), start_time)?;
    let sport = raw.sport.as_deref().map(Sport::from_str);

    let activity = Activity {
        activity_id,
        name: raw.name,
        description: raw.description,
        activity_type: raw.activity_type,
        sport: sport.clone(),
        sub_sport: raw.sub_sport,
        start_time,
        stop_time: raw.stop_time.as_deref().and_then(parse_time),
        elapsed_time: raw.elapsed_time,
        moving_time: raw.moving_time,
        distance: raw.distance.map(m_to_km),
        laps: raw.laps,
        calories: raw.calories,
        avg_hr: raw.avg_hr,
        max_hr: raw.max_hr,
        avg_speed: raw.avg_speed.map(ms_to_kph),
        max_speed: raw.max_speed.map(ms_to_kph),
        avg_temperature: raw.avg_temperature,
        start_lat: raw.start_latitude,
        start_long: raw.start_longitude,
        stop_lat: raw.stop_latitude,
        stop_long: raw.stop_longitude,
    };

    let mut set = RecordSet::new(activity);

    set.extension.steps = raw.steps;
    set.extension.strokes = raw.strokes;
    match sport.as_ref().map(|s| s.extension_kind()) {
        Some(ExtensionKind::Paddle) => {
            set.extension.avg_strokes_per_min = raw.avg_cadence;
            set.extension.max_strokes_per_min = raw.max_cadence;
        }
        Some(ExtensionKind::Cycle) | Some(ExtensionKind::Elliptical) => {
            set.extension.avg_rpms = raw.avg_cadence;
            set.extension.max_rpms = raw.max_cadence;
        }
        _ => {
            set.extension.avg_steps_per_min = raw.avg_cadence;
            set.extension.max_steps_per_min = raw.max_cadence;
        }
    }
    if matches!(
        sport.as_ref().map(|s| s.extension_kind()),
        Some(ExtensionKind::Steps)
    ) {
        set.extension.avg_pace = set.activity.avg_speed.and_then(pace_from_speed);
        set.extension.avg_moving_pace = raw
            .moving_time
            .zip(set.activity.distance)
            .and_then(|(secs, km)| if km > 0.0 { Some(secs / 60.0 / km) } else { None });
        set.extension.max_pace = set.activity.max_speed.and_then(pace_from_speed);
    }

    Ok(set)
}

/// Decode a details file: laps and records for an already-known activity.
pub fn decode_details(path: &Path) -> ImportResult<RecordSet> {
    let raw: DetailsFile = read_json(path)?;

    let activity_id = match raw.activity_id {
        Some(ref id) => id.to_string(),
        None => return Err(ImportError::decode(path, "details file has no activityId")),
    };
    if raw.laps.is_empty() && raw.records.is_empty() {
        return Err(ImportError::decode(path, "details file has no laps or records"));
    }

    let laps: Vec<Lap> = raw
        .laps
        .iter()
        .enumerate()
        .map(|(index, lap)| Lap {
            lap: lap.lap.unwrap_or(index as u32),
            start_time: lap.start_time.as_deref().and_then(parse_time),
            stop_time: lap.stop_time.as_deref().and_then(parse_time),
            elapsed_time: lap.elapsed_time,
            moving_time: lap.moving_time,
            distance: lap.distance.map(m_to_km),
            calories: lap.calories,
            avg_hr: lap.avg_hr,
            max_hr: lap.max_hr,
            avg_speed: lap.avg_speed.map(ms_to_kph),
            max_speed: lap.max_speed.map(ms_to_kph),
            start_lat: lap.start_latitude,
            start_long: lap.start_longitude,
        })
        .collect();

    let records: Vec<Record> = raw
        .records
        .iter()
        .enumerate()
        .map(|(index, record)| Record {
            record: index as u32,
            timestamp: record.timestamp.as_deref().and_then(parse_time),
            position_lat: record.latitude,
            position_long: record.longitude,
            distance: record.distance.map(m_to_km),
            altitude: record.altitude,
            hr: record.hr,
            cadence: record.cadence,
            speed: record.speed.map(ms_to_kph),
            temperature: record.temperature,
        })
        .collect();

    // Header fields the details file can vouch for; everything else is
    // left unset so an extend-mode write never clobbers summary data.
    let activity = Activity {
        activity_id,
        start_time: laps
            .first()
            .and_then(|l| l.start_time)
            .or_else(|| records.first().and_then(|r| r.timestamp)),
        stop_time: laps
            .last()
            .and_then(|l| l.stop_time)
            .or_else(|| records.last().and_then(|r| r.timestamp)),
        laps: Some(laps.len() as u32),
        ..Activity::default()
    };

    let mut set = RecordSet::new(activity);
    set.laps = laps;
    set.records = records;
    Ok(set)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> ImportResult<T> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(ImportError::EmptyInput(path.display().to_string()));
    }
    serde_json::from_str(&content).map_err(|e| ImportError::decode(path, e.to_string()))
}

fn resolve_id(
    path: &Path,
    explicit: Option<&IdValue>,
    start_time: Option<DateTime<Utc>>,
) -> ImportResult<String> {
    if let Some(id) = explicit {
        return Ok(id.to_string());
    }
    // No explicit id: derive a stable one from the start time
    match start_time {
        Some(start) => Ok(format!("json-{}", start.timestamp())),
        None => Err(ImportError::decode(
            path,
            "summary has neither activityId nor startTime",
        )),
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

fn m_to_km(m: f64) -> f64 {
    m / 1000.0
}

fn ms_to_kph(ms: f64) -> f64 {
    ms * 3.6
}

/// Activity ids appear as numbers or strings depending on export vintage.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdValue {
    Num(i64),
    Text(String),
}

impl std::fmt::Display for IdValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdValue::Num(n) => write!(f, "{}", n),
            IdValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummaryFile {
    activity_id: Option<IdValue>,
    name: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    activity_type: Option<String>,
    sport: Option<String>,
    sub_sport: Option<String>,
    start_time: Option<String>,
    stop_time: Option<String>,
    elapsed_time: Option<f64>,
    moving_time: Option<f64>,
    /// meters
    distance: Option<f64>,
    laps: Option<u32>,
    calories: Option<u32>,
    avg_hr: Option<u8>,
    max_hr: Option<u8>,
    /// m/s
    avg_speed: Option<f64>,
    max_speed: Option<f64>,
    avg_temperature: Option<f32>,
    start_latitude: Option<f64>,
    start_longitude: Option<f64>,
    stop_latitude: Option<f64>,
    stop_longitude: Option<f64>,
    steps: Option<u32>,
    strokes: Option<u32>,
    avg_cadence: Option<u16>,
    max_cadence: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DetailsFile {
    activity_id: Option<IdValue>,
    laps: Vec<DetailsLap>,
    records: Vec<DetailsRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DetailsLap {
    lap: Option<u32>,
    start_time: Option<String>,
    stop_time: Option<String>,
    elapsed_time: Option<f64>,
    moving_time: Option<f64>,
    distance: Option<f64>,
    calories: Option<u32>,
    avg_hr: Option<u8>,
    max_hr: Option<u8>,
    avg_speed: Option<f64>,
    max_speed: Option<f64>,
    start_latitude: Option<f64>,
    start_longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DetailsRecord {
    timestamp: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    distance: Option<f64>,
    altitude: Option<f64>,
    hr: Option<u8>,
    cadence: Option<u8>,
    speed: Option<f64>,
    temperature: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_json(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn decodes_summary_with_numeric_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            "summary.json",
            r#"{
                "activityId": 4242,
                "name": "Lunch Walk",
                "type": "walking",
                "sport": "walking",
                "subSport": "street",
                "startTime": "2023-11-14T12:00:00Z",
                "stopTime": "2023-11-14T12:40:00Z",
                "elapsedTime": 2400.0,
                "distance": 3200.0,
                "calories": 180,
                "avgHr": 95,
                "avgSpeed": 1.33,
                "steps": 4100,
                "avgCadence": 102
            }"#,
        );

        let set = decode_summary(&path).unwrap();
        assert_eq!(set.activity.activity_id, "4242");
        assert_eq!(set.activity.name.as_deref(), Some("Lunch Walk"));
        assert_eq!(set.activity.sport, Some(Sport::Walking));
        assert!((set.activity.distance.unwrap() - 3.2).abs() < 1e-9);
        assert_eq!(set.extension.steps, Some(4100));
        assert_eq!(set.extension.avg_steps_per_min, Some(102));
        assert!(set.extension.avg_pace.is_some());
        assert!(set.laps.is_empty());
        assert!(set.records.is_empty());
    }

    #[test]
    fn summary_without_id_derives_from_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            "noid.json",
            r#"{"startTime": "2023-11-14T12:00:00Z", "sport": "cycling"}"#,
        );
        let set = decode_summary(&path).unwrap();
        assert!(set.activity.activity_id.starts_with("json-"));
    }

    #[test]
    fn summary_without_id_or_start_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&dir, "bare.json", r#"{"name": "x"}"#);
        assert!(matches!(
            decode_summary(&path),
            Err(ImportError::Decode { .. })
        ));
    }

    #[test]
    fn decodes_details_records_and_laps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            "details.json",
            r#"{
                "activityId": "4242",
                "laps": [
                    {"startTime": "2023-11-14T12:00:00Z", "stopTime": "2023-11-14T12:20:00Z", "distance": 1600.0},
                    {"startTime": "2023-11-14T12:20:00Z", "stopTime": "2023-11-14T12:40:00Z", "distance": 1600.0}
                ],
                "records": [
                    {"timestamp": "2023-11-14T12:00:00Z", "latitude": 47.6, "longitude": -122.3, "hr": 90, "speed": 1.3},
                    {"timestamp": "2023-11-14T12:00:10Z", "hr": 96}
                ]
            }"#,
        );

        let set = decode_details(&path).unwrap();
        assert_eq!(set.activity.activity_id, "4242");
        assert_eq!(set.laps.len(), 2);
        assert_eq!(set.laps[1].lap, 1);
        assert_eq!(set.records.len(), 2);
        assert_eq!(set.records[1].record, 1);
        assert_eq!(set.records[1].position_lat, None);
        // 1.3 m/s -> 4.68 kph
        assert!((set.records[0].speed.unwrap() - 4.68).abs() < 1e-9);
        // header carries only what the details file can vouch for
        assert_eq!(set.activity.name, None);
        assert!(set.activity.start_time.is_some());
    }

    #[test]
    fn details_without_id_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&dir, "noid.json", r#"{"laps": [], "records": []}"#);
        assert!(matches!(
            decode_details(&path),
            Err(ImportError::Decode { .. })
        ));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&dir, "broken.json", "{not json");
        assert!(matches!(
            decode_summary(&path),
            Err(ImportError::Decode { .. })
        ));
    }

    #[test]
    fn empty_file_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&dir, "empty.json", "");
        assert!(matches!(
            decode_summary(&path),
            Err(ImportError::EmptyInput(_))
        ));
    }
}
