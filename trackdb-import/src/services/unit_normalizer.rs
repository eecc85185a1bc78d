//! Unit normalization
//!
//! Converts a record set between the metric and statute measurement
//! systems in place. Distance, speed, elevation, temperature, pace, and
//! length fields convert; heart rate, cadence, power counts, positions,
//! and timestamps are system-independent and pass through.
//!
//! The record set carries the system its values are expressed in, so
//! normalizing into the same system is a no-op and the operation is
//! idempotent.

use crate::models::RecordSet;
use trackdb_common::config::MeasurementSystem;

const MILES_PER_KM: f64 = 0.621371;
const FEET_PER_METER: f64 = 3.28084;
const INCHES_PER_CM: f64 = 0.393701;

/// Normalize a record set into the target measurement system.
pub fn normalize(set: &mut RecordSet, target: MeasurementSystem) {
    if set.system == target {
        return;
    }

    let direction = match target {
        MeasurementSystem::Statute => Direction::ToStatute,
        MeasurementSystem::Metric => Direction::ToMetric,
    };

    let activity = &mut set.activity;
    activity.distance = distance(activity.distance, direction);
    activity.avg_speed = distance(activity.avg_speed, direction);
    activity.max_speed = distance(activity.max_speed, direction);
    activity.avg_temperature = temperature(activity.avg_temperature, direction);

    for lap in &mut set.laps {
        lap.distance = distance(lap.distance, direction);
        lap.avg_speed = distance(lap.avg_speed, direction);
        lap.max_speed = distance(lap.max_speed, direction);
    }

    for record in &mut set.records {
        record.distance = distance(record.distance, direction);
        record.altitude = length(record.altitude, direction);
        record.speed = distance(record.speed, direction);
        record.temperature = temperature(record.temperature, direction);
    }

    let ext = &mut set.extension;
    ext.avg_pace = pace(ext.avg_pace, direction);
    ext.avg_moving_pace = pace(ext.avg_moving_pace, direction);
    ext.max_pace = pace(ext.max_pace, direction);
    ext.avg_step_length = length(ext.avg_step_length, direction);
    ext.avg_stroke_distance = length(ext.avg_stroke_distance, direction);
    ext.avg_vertical_oscillation = small_length(ext.avg_vertical_oscillation, direction);

    set.system = target;
}

#[derive(Clone, Copy)]
enum Direction {
    ToStatute,
    ToMetric,
}

/// km ↔ miles; also kph ↔ mph, since speed scales with distance.
fn distance(value: Option<f64>, direction: Direction) -> Option<f64> {
    value.map(|v| match direction {
        Direction::ToStatute => v * MILES_PER_KM,
        Direction::ToMetric => v / MILES_PER_KM,
    })
}

/// m ↔ ft
fn length(value: Option<f64>, direction: Direction) -> Option<f64> {
    value.map(|v| match direction {
        Direction::ToStatute => v * FEET_PER_METER,
        Direction::ToMetric => v / FEET_PER_METER,
    })
}

/// cm ↔ in
fn small_length(value: Option<f64>, direction: Direction) -> Option<f64> {
    value.map(|v| match direction {
        Direction::ToStatute => v * INCHES_PER_CM,
        Direction::ToMetric => v / INCHES_PER_CM,
    })
}

/// min/km ↔ min/mi; a mile takes more minutes than a kilometer.
fn pace(value: Option<f64>, direction: Direction) -> Option<f64> {
    value.map(|v| match direction {
        Direction::ToStatute => v / MILES_PER_KM,
        Direction::ToMetric => v * MILES_PER_KM,
    })
}

/// Celsius ↔ Fahrenheit
fn temperature(value: Option<f32>, direction: Direction) -> Option<f32> {
    value.map(|v| match direction {
        Direction::ToStatute => v * 9.0 / 5.0 + 32.0,
        Direction::ToMetric => (v - 32.0) * 5.0 / 9.0,
    })
}
