//! In-memory record sets produced by the format decoders
//!
//! A [`RecordSet`] is one decoded activity: header fields, laps, telemetry
//! records, sport-specific extension fields, and whatever device inventory
//! the file carried. Absent wire fields stay `None`; decoders never invent
//! defaults. Every set is tagged with the measurement system its values
//! are expressed in, which is what makes re-normalization a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trackdb_common::config::MeasurementSystem;

/// Sport taxonomy, as carried by the wire formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Running,
    Walking,
    Hiking,
    Cycling,
    Paddling,
    Rowing,
    Swimming,
    Elliptical,
    Training,
    /// Sport tag the pipeline has no dedicated variant for; the original
    /// tag is preserved for storage
    Other(String),
}

impl Sport {
    pub fn as_str(&self) -> &str {
        match self {
            Sport::Running => "running",
            Sport::Walking => "walking",
            Sport::Hiking => "hiking",
            Sport::Cycling => "cycling",
            Sport::Paddling => "paddling",
            Sport::Rowing => "rowing",
            Sport::Swimming => "swimming",
            Sport::Elliptical => "elliptical",
            Sport::Training => "training",
            Sport::Other(tag) => tag,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "running" => Sport::Running,
            "walking" => Sport::Walking,
            "hiking" => Sport::Hiking,
            "cycling" => Sport::Cycling,
            "paddling" => Sport::Paddling,
            "rowing" => Sport::Rowing,
            "swimming" => Sport::Swimming,
            "elliptical" => Sport::Elliptical,
            "training" => Sport::Training,
            other => Sport::Other(other.to_string()),
        }
    }

    /// Extension table this sport's per-sport fields live in.
    ///
    /// Total mapping: every activity gets exactly one extension row.
    /// Stroke-based sports share the paddle table, equipment sports the
    /// elliptical table, and anything unrecognized defaults to the
    /// on-foot table.
    pub fn extension_kind(&self) -> ExtensionKind {
        match self {
            Sport::Running | Sport::Walking | Sport::Hiking => ExtensionKind::Steps,
            Sport::Cycling => ExtensionKind::Cycle,
            Sport::Paddling | Sport::Rowing | Sport::Swimming => ExtensionKind::Paddle,
            Sport::Elliptical | Sport::Training => ExtensionKind::Elliptical,
            Sport::Other(_) => ExtensionKind::Steps,
        }
    }
}

/// The four sport-extension tables, as an explicit enumerated mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Steps,
    Paddle,
    Cycle,
    Elliptical,
}

impl ExtensionKind {
    pub const ALL: [ExtensionKind; 4] = [
        ExtensionKind::Steps,
        ExtensionKind::Paddle,
        ExtensionKind::Cycle,
        ExtensionKind::Elliptical,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            ExtensionKind::Steps => "steps_activities",
            ExtensionKind::Paddle => "paddle_activities",
            ExtensionKind::Cycle => "cycle_activities",
            ExtensionKind::Elliptical => "elliptical_activities",
        }
    }
}

/// Activity header fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    /// Stable identifier: the wire format's explicit id when present,
    /// otherwise derived from device serial + start time
    pub activity_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub activity_type: Option<String>,
    pub sport: Option<Sport>,
    pub sub_sport: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    /// Seconds
    pub elapsed_time: Option<f64>,
    /// Seconds
    pub moving_time: Option<f64>,
    /// km (metric) or miles (statute)
    pub distance: Option<f64>,
    pub laps: Option<u32>,
    pub calories: Option<u32>,
    pub avg_hr: Option<u8>,
    pub max_hr: Option<u8>,
    /// kph or mph
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    /// Celsius or Fahrenheit
    pub avg_temperature: Option<f32>,
    pub start_lat: Option<f64>,
    pub start_long: Option<f64>,
    pub stop_lat: Option<f64>,
    pub stop_long: Option<f64>,
}

/// One lap of an activity. Indices are contiguous from 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lap {
    pub lap: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    pub elapsed_time: Option<f64>,
    pub moving_time: Option<f64>,
    pub distance: Option<f64>,
    pub calories: Option<u32>,
    pub avg_hr: Option<u8>,
    pub max_hr: Option<u8>,
    pub avg_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub start_lat: Option<f64>,
    pub start_long: Option<f64>,
}

/// One timestamped telemetry sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub record: u32,
    pub timestamp: Option<DateTime<Utc>>,
    pub position_lat: Option<f64>,
    pub position_long: Option<f64>,
    pub distance: Option<f64>,
    /// m (metric) or ft (statute)
    pub altitude: Option<f64>,
    pub hr: Option<u8>,
    pub cadence: Option<u8>,
    pub speed: Option<f64>,
    pub temperature: Option<f32>,
}

/// Sport-specific fields, routed to the extension table matching the
/// activity's sport. All optional; a sport only populates its own subset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionFields {
    pub steps: Option<u32>,
    pub strokes: Option<u32>,
    /// min per km (metric) or min per mile (statute)
    pub avg_pace: Option<f64>,
    pub avg_moving_pace: Option<f64>,
    pub max_pace: Option<f64>,
    pub avg_steps_per_min: Option<u16>,
    pub max_steps_per_min: Option<u16>,
    /// m or ft
    pub avg_step_length: Option<f64>,
    /// cm or in
    pub avg_vertical_oscillation: Option<f64>,
    /// milliseconds
    pub avg_ground_contact_time: Option<f64>,
    pub avg_stroke_distance: Option<f64>,
    pub avg_strokes_per_min: Option<u16>,
    pub max_strokes_per_min: Option<u16>,
    pub avg_rpms: Option<u16>,
    pub max_rpms: Option<u16>,
}

impl ExtensionFields {
    pub fn is_empty(&self) -> bool {
        *self == ExtensionFields::default()
    }
}

/// Device inventory fields carried by a source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceFields {
    pub serial_number: Option<i64>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub hardware_version: Option<String>,
    pub software_version: Option<String>,
    pub battery_status: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One decoded activity, ready for normalization and persistence.
#[derive(Debug, Clone)]
pub struct RecordSet {
    /// Unit system the set's values are currently expressed in
    pub system: MeasurementSystem,
    pub activity: Activity,
    pub laps: Vec<Lap>,
    pub records: Vec<Record>,
    pub extension: ExtensionFields,
    pub device: Option<DeviceFields>,
    /// Source file ended mid-message; leading records were kept
    pub truncated: bool,
}

impl RecordSet {
    /// A metric-tagged set around an activity header. Decoders start here.
    pub fn new(activity: Activity) -> Self {
        Self {
            system: MeasurementSystem::Metric,
            activity,
            laps: Vec::new(),
            records: Vec::new(),
            extension: ExtensionFields::default(),
            device: None,
            truncated: false,
        }
    }
}

/// Pace in minutes per distance unit, from speed in distance units per
/// hour. Zero or negative speeds yield no pace.
pub fn pace_from_speed(speed: f64) -> Option<f64> {
    if speed > 0.0 {
        Some(60.0 / speed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sport_maps_to_one_extension_table() {
        let sports = [
            Sport::Running,
            Sport::Walking,
            Sport::Hiking,
            Sport::Cycling,
            Sport::Paddling,
            Sport::Rowing,
            Sport::Swimming,
            Sport::Elliptical,
            Sport::Training,
            Sport::Other("snowboarding".to_string()),
        ];
        for sport in sports {
            // Total mapping: no sport is left without an extension table
            let kind = sport.extension_kind();
            assert!(ExtensionKind::ALL.contains(&kind));
        }
    }

    #[test]
    fn unknown_sport_tag_is_preserved() {
        let sport = Sport::from_str("snowboarding");
        assert_eq!(sport.as_str(), "snowboarding");
        assert_eq!(sport, Sport::Other("snowboarding".to_string()));
    }

    #[test]
    fn pace_from_speed_handles_zero() {
        assert_eq!(pace_from_speed(0.0), None);
        let pace = pace_from_speed(12.0).unwrap();
        assert!((pace - 5.0).abs() < 1e-9);
    }
}
