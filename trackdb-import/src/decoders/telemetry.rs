//! Binary telemetry decoder
//!
//! Telemetry files (`.tlm`) are a little-endian sequence of typed,
//! length-prefixed messages behind a fixed 8-byte file header:
//!
//! ```text
//! ┌────────┬─────────┬───────┬──────────┐
//! │ Magic  │ Version │ Flags │ Reserved │
//! │ 2 bytes│ 1 byte  │ 1 byte│ 4 bytes  │
//! └────────┴─────────┴───────┴──────────┘
//! ```
//!
//! Message header (4 bytes): type tag, reserved byte, payload length.
//! Unknown type tags are skipped using the length prefix, so files from
//! newer firmware still import. A file that ends mid-message keeps every
//! fully-readable leading message and flags the set as truncated instead
//! of failing.
//!
//! | Tag  | Message          |
//! |------|------------------|
//! | 0x01 | Device info      |
//! | 0x02 | Activity summary |
//! | 0x03 | Lap              |
//! | 0x04 | Record           |
//! | 0x05 | Sport extension  |
//!
//! Numeric fields use all-ones sentinels for "absent" (0xFF / 0xFFFF /
//! 0xFFFFFFFF, 0x7F / 0x7FFFFFFF for signed), which decode to `None`.

use crate::error::{ImportError, ImportResult};
use crate::models::record_set::{
    pace_from_speed, Activity, DeviceFields, ExtensionKind, Lap, Record, RecordSet, Sport,
};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, warn};

/// Magic bytes "TL", little-endian
pub const TELEMETRY_MAGIC: u16 = 0x4C54;

/// Supported container version
pub const TELEMETRY_VERSION: u8 = 1;

const FILE_HEADER_LEN: usize = 8;
const MESSAGE_HEADER_LEN: usize = 4;

const MSG_DEVICE_INFO: u8 = 0x01;
const MSG_ACTIVITY_SUMMARY: u8 = 0x02;
const MSG_LAP: u8 = 0x03;
const MSG_RECORD: u8 = 0x04;
const MSG_SPORT_EXTENSION: u8 = 0x05;

const DEVICE_INFO_LEN: usize = 16;
const ACTIVITY_SUMMARY_LEN: usize = 32;
const LAP_LEN: usize = 38;
const RECORD_LEN: usize = 25;
const SPORT_EXTENSION_LEN: usize = 20;

const INVALID_U8: u8 = u8::MAX;
const INVALID_U16: u16 = u16::MAX;
const INVALID_U32: u32 = u32::MAX;
const INVALID_I8: i8 = i8::MAX;
const INVALID_I32: i32 = i32::MAX;

/// Check whether a file starts with the telemetry magic.
pub fn sniff(path: &Path) -> bool {
    let mut header = [0u8; 2];
    match std::fs::File::open(path) {
        Ok(mut file) => {
            use std::io::Read;
            file.read_exact(&mut header).is_ok()
                && u16::from_le_bytes(header) == TELEMETRY_MAGIC
        }
        Err(_) => false,
    }
}

/// Decode one telemetry file into a metric record set.
pub fn decode(path: &Path) -> ImportResult<RecordSet> {
    let data = std::fs::read(path)?;

    if data.is_empty() {
        return Err(ImportError::EmptyInput(path.display().to_string()));
    }
    if data.len() < FILE_HEADER_LEN {
        return Err(ImportError::decode(path, "file shorter than header"));
    }

    let magic = u16::from_le_bytes([data[0], data[1]]);
    if magic != TELEMETRY_MAGIC {
        return Err(ImportError::decode(
            path,
            format!("bad magic 0x{:04X}", magic),
        ));
    }
    let version = data[2];
    if version != TELEMETRY_VERSION {
        return Err(ImportError::UnsupportedVariant(format!(
            "telemetry version {} in {}",
            version,
            path.display()
        )));
    }

    let mut parsed = Parsed::default();
    let mut cursor = FILE_HEADER_LEN;

    while cursor < data.len() {
        let remaining = &data[cursor..];
        if remaining.len() < MESSAGE_HEADER_LEN {
            parsed.truncated = true;
            break;
        }
        let msg_type = remaining[0];
        let payload_len = u16::from_le_bytes([remaining[2], remaining[3]]) as usize;
        if remaining.len() < MESSAGE_HEADER_LEN + payload_len {
            parsed.truncated = true;
            break;
        }
        let payload = &remaining[MESSAGE_HEADER_LEN..MESSAGE_HEADER_LEN + payload_len];

        match msg_type {
            MSG_DEVICE_INFO => parsed.device = Some(parse_device_info(path, payload)?),
            MSG_ACTIVITY_SUMMARY => parsed.summary = Some(parse_summary(path, payload)?),
            MSG_LAP => parsed.laps.push(parse_lap(path, payload)?),
            MSG_RECORD => parsed.records.push(parse_record(path, payload)?),
            MSG_SPORT_EXTENSION => parsed.extension = Some(parse_extension(path, payload)?),
            unknown => {
                // Forward compatibility: newer firmware adds new tags
                debug!(tag = unknown, len = payload_len, "Skipping unknown message type");
            }
        }

        cursor += MESSAGE_HEADER_LEN + payload_len;
    }

    if parsed.truncated {
        warn!(
            path = %path.display(),
            records = parsed.records.len(),
            "Telemetry file truncated; keeping fully-readable leading messages"
        );
    }

    parsed.into_record_set(path)
}

#[derive(Default)]
struct Parsed {
    device: Option<DeviceFields>,
    summary: Option<Summary>,
    laps: Vec<Lap>,
    records: Vec<Record>,
    extension: Option<RawExtension>,
    truncated: bool,
}

struct Summary {
    start_time: Option<DateTime<Utc>>,
    stop_time: Option<DateTime<Utc>>,
    elapsed_time: Option<f64>,
    moving_time: Option<f64>,
    sport: Option<Sport>,
    sub_sport: Option<String>,
    distance: Option<f64>,
    calories: Option<u32>,
    avg_speed: Option<f64>,
    max_speed: Option<f64>,
    avg_hr: Option<u8>,
    max_hr: Option<u8>,
    avg_temperature: Option<f32>,
}

struct RawExtension {
    steps: Option<u32>,
    strokes: Option<u32>,
    avg_step_length: Option<f64>,
    avg_vertical_oscillation: Option<f64>,
    avg_ground_contact_time: Option<f64>,
    avg_cadence: Option<u16>,
    max_cadence: Option<u16>,
    avg_stroke_distance: Option<f64>,
}

impl Parsed {
    fn into_record_set(mut self, path: &Path) -> ImportResult<RecordSet> {
        let summary = self
            .summary
            .ok_or_else(|| ImportError::decode(path, "no activity summary message"))?;

        let serial = self
            .device
            .as_ref()
            .and_then(|d| d.serial_number)
            .unwrap_or(0);
        let start_unix = summary
            .start_time
            .map(|t| t.timestamp())
            .ok_or_else(|| ImportError::decode(path, "summary has no start time"))?;
        let activity_id = format!("{}-{}", serial, start_unix);

        self.laps.sort_by_key(|lap| lap.lap);
        for (index, record) in self.records.iter_mut().enumerate() {
            record.record = index as u32;
        }

        let activity = Activity {
            activity_id,
            sport: summary.sport.clone(),
            sub_sport: summary.sub_sport,
            start_time: summary.start_time,
            stop_time: summary.stop_time,
            elapsed_time: summary.elapsed_time,
            moving_time: summary.moving_time,
            distance: summary.distance,
            laps: Some(self.laps.len() as u32),
            calories: summary.calories,
            avg_hr: summary.avg_hr,
            max_hr: summary.max_hr,
            avg_speed: summary.avg_speed,
            max_speed: summary.max_speed,
            avg_temperature: summary.avg_temperature,
            start_lat: self.records.first().and_then(|r| r.position_lat),
            start_long: self.records.first().and_then(|r| r.position_long),
            stop_lat: self.records.last().and_then(|r| r.position_lat),
            stop_long: self.records.last().and_then(|r| r.position_long),
            ..Activity::default()
        };

        let mut set = RecordSet::new(activity);
        set.laps = self.laps;
        set.records = self.records;
        set.device = self.device;
        set.truncated = self.truncated;

        if let Some(raw) = self.extension {
            let kind = set
                .activity
                .sport
                .as_ref()
                .map(|s| s.extension_kind())
                .unwrap_or(ExtensionKind::Steps);
            set.extension.steps = raw.steps;
            set.extension.strokes = raw.strokes;
            set.extension.avg_step_length = raw.avg_step_length;
            set.extension.avg_vertical_oscillation = raw.avg_vertical_oscillation;
            set.extension.avg_ground_contact_time = raw.avg_ground_contact_time;
            set.extension.avg_stroke_distance = raw.avg_stroke_distance;
            match kind {
                ExtensionKind::Steps => {
                    set.extension.avg_steps_per_min = raw.avg_cadence;
                    set.extension.max_steps_per_min = raw.max_cadence;
                }
                ExtensionKind::Paddle => {
                    set.extension.avg_strokes_per_min = raw.avg_cadence;
                    set.extension.max_strokes_per_min = raw.max_cadence;
                }
                ExtensionKind::Cycle | ExtensionKind::Elliptical => {
                    set.extension.avg_rpms = raw.avg_cadence;
                    set.extension.max_rpms = raw.max_cadence;
                }
            }
        }

        // Pace is derived, not carried on the wire
        if matches!(
            set.activity.sport.as_ref().map(|s| s.extension_kind()),
            Some(ExtensionKind::Steps)
        ) {
            set.extension.avg_pace = set.activity.avg_speed.and_then(pace_from_speed);
            set.extension.max_pace = set.activity.max_speed.and_then(pace_from_speed);
        }

        Ok(set)
    }
}

fn parse_device_info(path: &Path, payload: &[u8]) -> ImportResult<DeviceFields> {
    if payload.len() < DEVICE_INFO_LEN {
        return Err(ImportError::decode(path, "short device info message"));
    }
    let serial = opt_u32(u32_at(payload, 0));
    let manufacturer_id = opt_u16(u16_at(payload, 4));
    let product_id = opt_u16(u16_at(payload, 6));
    let software = opt_u16(u16_at(payload, 8));
    let hardware = opt_u8(payload[10]);
    let battery = opt_u8(payload[11]);
    let timestamp = opt_u32(u32_at(payload, 12));

    Ok(DeviceFields {
        serial_number: serial.map(i64::from),
        manufacturer: manufacturer_id.map(manufacturer_name),
        product: product_id.map(|p| p.to_string()),
        hardware_version: hardware.map(|v| v.to_string()),
        software_version: software.map(|v| format!("{}.{:02}", v / 100, v % 100)),
        battery_status: battery.and_then(battery_status_name),
        timestamp: timestamp.and_then(timestamp_from_unix),
    })
}

fn parse_summary(path: &Path, payload: &[u8]) -> ImportResult<Summary> {
    if payload.len() < ACTIVITY_SUMMARY_LEN {
        return Err(ImportError::decode(path, "short activity summary message"));
    }
    Ok(Summary {
        start_time: opt_u32(u32_at(payload, 0)).and_then(timestamp_from_unix),
        stop_time: opt_u32(u32_at(payload, 4)).and_then(timestamp_from_unix),
        elapsed_time: opt_u32(u32_at(payload, 8)).map(millis_to_secs),
        moving_time: opt_u32(u32_at(payload, 12)).map(millis_to_secs),
        sport: opt_u8(payload[16]).map(sport_from_code),
        sub_sport: opt_u8(payload[17]).map(sub_sport_name),
        distance: opt_u32(u32_at(payload, 18)).map(cm_to_km),
        calories: opt_u16(u16_at(payload, 22)).map(u32::from),
        avg_speed: opt_u16(u16_at(payload, 24)).map(mms_to_kph),
        max_speed: opt_u16(u16_at(payload, 26)).map(mms_to_kph),
        avg_hr: opt_u8(payload[28]),
        max_hr: opt_u8(payload[29]),
        avg_temperature: opt_i8(payload[30] as i8).map(f32::from),
    })
}

fn parse_lap(path: &Path, payload: &[u8]) -> ImportResult<Lap> {
    if payload.len() < LAP_LEN {
        return Err(ImportError::decode(path, "short lap message"));
    }
    Ok(Lap {
        lap: u32::from(u16_at(payload, 0)),
        start_time: opt_u32(u32_at(payload, 2)).and_then(timestamp_from_unix),
        stop_time: opt_u32(u32_at(payload, 6)).and_then(timestamp_from_unix),
        elapsed_time: opt_u32(u32_at(payload, 10)).map(millis_to_secs),
        moving_time: opt_u32(u32_at(payload, 14)).map(millis_to_secs),
        distance: opt_u32(u32_at(payload, 18)).map(cm_to_km),
        calories: opt_u16(u16_at(payload, 22)).map(u32::from),
        avg_speed: opt_u16(u16_at(payload, 24)).map(mms_to_kph),
        max_speed: opt_u16(u16_at(payload, 26)).map(mms_to_kph),
        avg_hr: opt_u8(payload[28]),
        max_hr: opt_u8(payload[29]),
        start_lat: opt_i32(i32_at(payload, 30)).map(degrees_from_fixed),
        start_long: opt_i32(i32_at(payload, 34)).map(degrees_from_fixed),
    })
}

fn parse_record(path: &Path, payload: &[u8]) -> ImportResult<Record> {
    if payload.len() < RECORD_LEN {
        return Err(ImportError::decode(path, "short record message"));
    }
    Ok(Record {
        record: 0, // assigned after the full file is read
        timestamp: opt_u32(u32_at(payload, 0)).and_then(timestamp_from_unix),
        position_lat: opt_i32(i32_at(payload, 4)).map(degrees_from_fixed),
        position_long: opt_i32(i32_at(payload, 8)).map(degrees_from_fixed),
        distance: opt_u32(u32_at(payload, 12)).map(cm_to_km),
        altitude: opt_i32(i32_at(payload, 16)).map(|cm| f64::from(cm) / 100.0),
        speed: opt_u16(u16_at(payload, 20)).map(mms_to_kph),
        hr: opt_u8(payload[22]),
        cadence: opt_u8(payload[23]),
        temperature: opt_i8(payload[24] as i8).map(f32::from),
    })
}

fn parse_extension(path: &Path, payload: &[u8]) -> ImportResult<RawExtension> {
    if payload.len() < SPORT_EXTENSION_LEN {
        return Err(ImportError::decode(path, "short sport extension message"));
    }
    Ok(RawExtension {
        steps: opt_u32(u32_at(payload, 0)),
        strokes: opt_u32(u32_at(payload, 4)),
        avg_step_length: opt_u16(u16_at(payload, 8)).map(|mm| f64::from(mm) / 1000.0),
        avg_vertical_oscillation: opt_u16(u16_at(payload, 10)).map(|v| f64::from(v) / 100.0),
        avg_ground_contact_time: opt_u16(u16_at(payload, 12)).map(f64::from),
        avg_cadence: opt_u16(u16_at(payload, 14)),
        max_cadence: opt_u16(u16_at(payload, 16)),
        avg_stroke_distance: opt_u16(u16_at(payload, 18)).map(|cm| f64::from(cm) / 100.0),
    })
}

// ============================================================================
// Field plumbing
// ============================================================================

fn u16_at(payload: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([payload[offset], payload[offset + 1]])
}

fn u32_at(payload: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ])
}

fn i32_at(payload: &[u8], offset: usize) -> i32 {
    u32_at(payload, offset) as i32
}

fn opt_u8(value: u8) -> Option<u8> {
    (value != INVALID_U8).then_some(value)
}

fn opt_u16(value: u16) -> Option<u16> {
    (value != INVALID_U16).then_some(value)
}

fn opt_u32(value: u32) -> Option<u32> {
    (value != INVALID_U32).then_some(value)
}

fn opt_i8(value: i8) -> Option<i8> {
    (value != INVALID_I8).then_some(value)
}

fn opt_i32(value: i32) -> Option<i32> {
    (value != INVALID_I32).then_some(value)
}

fn timestamp_from_unix(ts: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::from(ts), 0)
}

fn millis_to_secs(ms: u32) -> f64 {
    f64::from(ms) / 1000.0
}

fn cm_to_km(cm: u32) -> f64 {
    f64::from(cm) / 100_000.0
}

fn mms_to_kph(mms: u16) -> f64 {
    f64::from(mms) * 0.0036
}

/// Positions are fixed-point degrees, 1e-7 per unit.
fn degrees_from_fixed(fixed: i32) -> f64 {
    f64::from(fixed) / 1e7
}

fn sport_from_code(code: u8) -> Sport {
    match code {
        1 => Sport::Running,
        2 => Sport::Cycling,
        3 => Sport::Walking,
        4 => Sport::Hiking,
        5 => Sport::Paddling,
        6 => Sport::Rowing,
        7 => Sport::Elliptical,
        8 => Sport::Swimming,
        9 => Sport::Training,
        other => Sport::Other(format!("sport_{}", other)),
    }
}

fn sub_sport_name(code: u8) -> String {
    match code {
        0 => "generic".to_string(),
        1 => "treadmill".to_string(),
        2 => "street".to_string(),
        3 => "trail".to_string(),
        4 => "track".to_string(),
        5 => "road".to_string(),
        6 => "mountain".to_string(),
        7 => "indoor".to_string(),
        other => format!("sub_sport_{}", other),
    }
}

fn manufacturer_name(id: u16) -> String {
    match id {
        1 => "traksport".to_string(),
        2 => "peakwear".to_string(),
        3 => "cadencelab".to_string(),
        other => format!("manufacturer_{}", other),
    }
}

fn battery_status_name(code: u8) -> Option<String> {
    let name = match code {
        1 => "new",
        2 => "good",
        3 => "ok",
        4 => "low",
        5 => "critical",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackdb_common::config::MeasurementSystem;

    // Byte builders for fixture files. The pipeline never encodes this
    // format; tests construct inputs by hand.

    fn push_message(out: &mut Vec<u8>, msg_type: u8, payload: &[u8]) {
        out.push(msg_type);
        out.push(0);
        out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        out.extend_from_slice(payload);
    }

    fn file_header(version: u8) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&TELEMETRY_MAGIC.to_le_bytes());
        out.push(version);
        out.push(0);
        out.extend_from_slice(&0u32.to_le_bytes());
        out
    }

    fn device_info_payload(serial: u32) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&serial.to_le_bytes()); // serial
        p.extend_from_slice(&1u16.to_le_bytes()); // manufacturer
        p.extend_from_slice(&301u16.to_le_bytes()); // product
        p.extend_from_slice(&523u16.to_le_bytes()); // software 5.23
        p.push(2); // hardware
        p.push(2); // battery good
        p.extend_from_slice(&1_700_000_000u32.to_le_bytes());
        p
    }

    fn summary_payload(start: u32, stop: u32, sport: u8) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&start.to_le_bytes());
        p.extend_from_slice(&stop.to_le_bytes());
        p.extend_from_slice(&((stop - start) * 1000).to_le_bytes()); // elapsed ms
        p.extend_from_slice(&((stop - start) * 900).to_le_bytes()); // moving ms
        p.push(sport);
        p.push(3); // trail
        p.extend_from_slice(&1_000_000u32.to_le_bytes()); // 10.0 km in cm
        p.extend_from_slice(&450u16.to_le_bytes()); // calories
        p.extend_from_slice(&2778u16.to_le_bytes()); // ~10.0 kph in mm/s
        p.extend_from_slice(&3333u16.to_le_bytes()); // ~12.0 kph
        p.push(150); // avg hr
        p.push(175); // max hr
        p.push(21u8); // 21 C
        p.push(0); // reserved
        p
    }

    fn record_payload(ts: u32, hr: u8) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&ts.to_le_bytes());
        p.extend_from_slice(&(47_600_0000i32).to_le_bytes()); // 47.6 deg
        p.extend_from_slice(&(-122_300_0000i32).to_le_bytes());
        p.extend_from_slice(&50_000u32.to_le_bytes()); // 0.5 km
        p.extend_from_slice(&12_000i32.to_le_bytes()); // 120 m
        p.extend_from_slice(&2778u16.to_le_bytes());
        p.push(hr);
        p.push(85); // cadence
        p.push(20u8); // temp
        p
    }

    fn write_tlm(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn decodes_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = file_header(TELEMETRY_VERSION);
        push_message(&mut bytes, MSG_DEVICE_INFO, &device_info_payload(900123));
        push_message(&mut bytes, MSG_ACTIVITY_SUMMARY, &summary_payload(1_700_000_000, 1_700_003_600, 1));
        push_message(&mut bytes, MSG_RECORD, &record_payload(1_700_000_000, 140));
        push_message(&mut bytes, MSG_RECORD, &record_payload(1_700_000_010, 145));
        let path = write_tlm(&dir, "run.tlm", &bytes);

        let set = decode(&path).unwrap();
        assert_eq!(set.system, MeasurementSystem::Metric);
        assert_eq!(set.activity.activity_id, "900123-1700000000");
        assert_eq!(set.activity.sport, Some(Sport::Running));
        assert_eq!(set.activity.sub_sport.as_deref(), Some("trail"));
        assert!((set.activity.distance.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(set.activity.calories, Some(450));
        assert_eq!(set.records.len(), 2);
        assert_eq!(set.records[1].record, 1);
        assert_eq!(set.records[0].hr, Some(140));
        assert!(!set.truncated);

        let device = set.device.unwrap();
        assert_eq!(device.serial_number, Some(900123));
        assert_eq!(device.manufacturer.as_deref(), Some("traksport"));
        assert_eq!(device.software_version.as_deref(), Some("5.23"));
        assert_eq!(device.battery_status.as_deref(), Some("good"));
    }

    #[test]
    fn unknown_message_types_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = file_header(TELEMETRY_VERSION);
        push_message(&mut bytes, MSG_ACTIVITY_SUMMARY, &summary_payload(1_700_000_000, 1_700_000_600, 2));
        push_message(&mut bytes, 0x7E, &[1, 2, 3, 4, 5]); // future firmware
        push_message(&mut bytes, MSG_RECORD, &record_payload(1_700_000_000, 130));
        let path = write_tlm(&dir, "ride.tlm", &bytes);

        let set = decode(&path).unwrap();
        assert_eq!(set.activity.sport, Some(Sport::Cycling));
        assert_eq!(set.records.len(), 1);
    }

    #[test]
    fn truncated_tail_keeps_leading_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = file_header(TELEMETRY_VERSION);
        push_message(&mut bytes, MSG_ACTIVITY_SUMMARY, &summary_payload(1_700_000_000, 1_700_000_600, 1));
        push_message(&mut bytes, MSG_RECORD, &record_payload(1_700_000_000, 130));
        // Partial final record: header promises more bytes than exist
        bytes.push(MSG_RECORD);
        bytes.push(0);
        bytes.extend_from_slice(&(RECORD_LEN as u16).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 5]);
        let path = write_tlm(&dir, "partial.tlm", &bytes);

        let set = decode(&path).unwrap();
        assert!(set.truncated);
        assert_eq!(set.records.len(), 1);
    }

    #[test]
    fn sentinel_fields_decode_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let mut summary = summary_payload(1_700_000_000, 1_700_000_600, 1);
        summary[22] = 0xFF; // calories sentinel
        summary[23] = 0xFF;
        summary[28] = INVALID_U8; // avg hr
        let mut bytes = file_header(TELEMETRY_VERSION);
        push_message(&mut bytes, MSG_ACTIVITY_SUMMARY, &summary);
        let path = write_tlm(&dir, "sparse.tlm", &bytes);

        let set = decode(&path).unwrap();
        assert_eq!(set.activity.calories, None);
        assert_eq!(set.activity.avg_hr, None);
        assert_eq!(set.activity.max_hr, Some(175));
    }

    #[test]
    fn bad_magic_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tlm(&dir, "not.tlm", b"XXXXXXXXXXXX");
        assert!(matches!(
            decode(&path),
            Err(ImportError::Decode { .. })
        ));
    }

    #[test]
    fn future_version_is_unsupported_variant() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = file_header(9);
        let path = write_tlm(&dir, "v9.tlm", &bytes);
        assert!(matches!(
            decode(&path),
            Err(ImportError::UnsupportedVariant(_))
        ));
    }

    #[test]
    fn empty_file_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tlm(&dir, "empty.tlm", b"");
        assert!(matches!(decode(&path), Err(ImportError::EmptyInput(_))));
    }

    #[test]
    fn sniff_detects_magic() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_tlm(&dir, "good.tlm", &file_header(TELEMETRY_VERSION));
        let bad = write_tlm(&dir, "bad.tlm", b"<xml/>");
        assert!(sniff(&good));
        assert!(!sniff(&bad));
    }
}
