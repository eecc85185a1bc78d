//! XML interchange decoder
//!
//! Exchange files (`.axf`) hold one activity as ordered lap elements with
//! ordered point elements:
//!
//! ```text
//! <ActivityLog>
//!   <Activity id="..." sport="running" sub_sport="trail">
//!     <Name>...</Name>
//!     <Lap start_time="2023-11-14T21:33:20Z">
//!       <TotalTime>600.0</TotalTime>     seconds
//!       <Distance>1609.3</Distance>      meters
//!       <Calories>50</Calories>
//!       <AvgHr>140</AvgHr> <MaxHr>152</MaxHr>
//!       <AvgSpeed>2.8</AvgSpeed> <MaxSpeed>3.2</MaxSpeed>   m/s
//!       <Point>
//!         <Time>2023-11-14T21:33:20Z</Time>
//!         <Lat>47.61</Lat> <Lon>-122.33</Lon>
//!         <Alt>120.0</Alt> <Dist>10.0</Dist>
//!         <Hr>140</Hr> <Cad>85</Cad> <Temp>20</Temp> <Speed>2.8</Speed>
//!       </Point>
//!       ...
//!     </Lap>
//!   </Activity>
//! </ActivityLog>
//! ```
//!
//! A per-lap fragment (root `<Lap>`, no surrounding activity) is also
//! accepted; fragment laps are indexed from 0 in file order. Activity
//! header fields the file does not carry are aggregated from the laps.

use crate::error::{ImportError, ImportResult};
use crate::models::record_set::{Activity, Lap, Record, RecordSet, Sport};
use chrono::{DateTime, Duration, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Decode one exchange file into a metric record set.
pub fn decode(path: &Path) -> ImportResult<RecordSet> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(ImportError::EmptyInput(path.display().to_string()));
    }

    let mut reader = Reader::from_str(&content);
    let mut walker = Walker::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => walker.on_start(path, &e)?,
            Ok(Event::Empty(e)) => {
                // Self-closing elements carry attributes only
                walker.on_start(path, &e)?;
                walker.on_end(e.name().as_ref());
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| ImportError::decode(path, e.to_string()))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    walker.text = Some(trimmed.to_string());
                }
            }
            Ok(Event::End(e)) => walker.on_end(e.name().as_ref()),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ImportError::decode(path, e.to_string())),
        }
    }

    walker.into_record_set(path)
}

#[derive(Default)]
struct Walker {
    seen_root: bool,
    activity_id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    sport: Option<Sport>,
    sub_sport: Option<String>,
    laps: Vec<Lap>,
    records: Vec<Record>,
    lap: Option<Lap>,
    point: Option<Record>,
    text: Option<String>,
}

impl Walker {
    fn on_start(&mut self, path: &Path, element: &BytesStart<'_>) -> ImportResult<()> {
        self.text = None;
        match element.name().as_ref() {
            b"ActivityLog" => {
                self.seen_root = true;
            }
            b"Activity" => {
                self.seen_root = true;
                for attr in element.attributes() {
                    let attr = attr.map_err(|e| ImportError::decode(path, e.to_string()))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| ImportError::decode(path, e.to_string()))?;
                    match attr.key.as_ref() {
                        b"id" => self.activity_id = Some(value.into_owned()),
                        b"sport" => self.sport = Some(Sport::from_str(&value)),
                        b"sub_sport" => self.sub_sport = Some(value.into_owned()),
                        _ => {}
                    }
                }
            }
            b"Lap" => {
                self.seen_root = true;
                let mut lap = Lap {
                    lap: self.laps.len() as u32,
                    ..Lap::default()
                };
                for attr in element.attributes() {
                    let attr = attr.map_err(|e| ImportError::decode(path, e.to_string()))?;
                    if attr.key.as_ref() == b"start_time" {
                        let value = attr
                            .unescape_value()
                            .map_err(|e| ImportError::decode(path, e.to_string()))?;
                        lap.start_time = parse_time(path, &value).map(Some)?;
                    }
                }
                self.lap = Some(lap);
            }
            b"Point" => {
                if self.lap.is_none() {
                    return Err(ImportError::decode(path, "point outside of a lap"));
                }
                self.point = Some(Record {
                    record: self.records.len() as u32,
                    ..Record::default()
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn on_end(&mut self, name: &[u8]) {
        let text = self.text.take();
        match name {
            b"Lap" => {
                if let Some(mut lap) = self.lap.take() {
                    // Stop time is derived when the file only carries a duration
                    if lap.stop_time.is_none() {
                        lap.stop_time = match (lap.start_time, lap.elapsed_time) {
                            (Some(start), Some(secs)) => {
                                Some(start + Duration::milliseconds((secs * 1000.0) as i64))
                            }
                            _ => None,
                        };
                    }
                    self.laps.push(lap);
                }
            }
            b"Point" => {
                if let Some(point) = self.point.take() {
                    self.records.push(point);
                }
            }
            leaf => {
                if let Some(value) = text {
                    self.assign_leaf(leaf, &value);
                }
            }
        }
    }

    fn assign_leaf(&mut self, name: &[u8], value: &str) {
        if let Some(point) = self.point.as_mut() {
            match name {
                b"Time" => point.timestamp = parse_time_opt(value),
                b"Lat" => point.position_lat = value.parse().ok(),
                b"Lon" => point.position_long = value.parse().ok(),
                b"Alt" => point.altitude = value.parse().ok(),
                b"Dist" => point.distance = value.parse::<f64>().ok().map(m_to_km),
                b"Hr" => point.hr = value.parse().ok(),
                b"Cad" => point.cadence = value.parse().ok(),
                b"Temp" => point.temperature = value.parse().ok(),
                b"Speed" => point.speed = value.parse::<f64>().ok().map(ms_to_kph),
                _ => {}
            }
            return;
        }
        if let Some(lap) = self.lap.as_mut() {
            match name {
                b"TotalTime" => lap.elapsed_time = value.parse().ok(),
                b"MovingTime" => lap.moving_time = value.parse().ok(),
                b"Distance" => lap.distance = value.parse::<f64>().ok().map(m_to_km),
                b"Calories" => lap.calories = value.parse().ok(),
                b"AvgHr" => lap.avg_hr = value.parse().ok(),
                b"MaxHr" => lap.max_hr = value.parse().ok(),
                b"AvgSpeed" => lap.avg_speed = value.parse::<f64>().ok().map(ms_to_kph),
                b"MaxSpeed" => lap.max_speed = value.parse::<f64>().ok().map(ms_to_kph),
                _ => {}
            }
            return;
        }
        match name {
            b"Name" => self.name = Some(value.to_string()),
            b"Description" => self.description = Some(value.to_string()),
            _ => {}
        }
    }

    fn into_record_set(self, path: &Path) -> ImportResult<RecordSet> {
        if !self.seen_root {
            return Err(ImportError::decode(path, "no activity or lap root element"));
        }
        if self.laps.is_empty() {
            return Err(ImportError::decode(path, "no laps in file"));
        }

        let start_time = self.laps.first().and_then(|l| l.start_time);
        let stop_time = self
            .laps
            .last()
            .and_then(|l| l.stop_time)
            .or_else(|| self.records.last().and_then(|r| r.timestamp));

        let activity_id = match self.activity_id {
            Some(id) => id,
            None => {
                let start = start_time
                    .ok_or_else(|| ImportError::decode(path, "no start time for identifier"))?;
                format!("xchg-{}", start.timestamp())
            }
        };

        let distance = sum_optional(self.laps.iter().map(|l| l.distance));
        let elapsed_time = sum_optional(self.laps.iter().map(|l| l.elapsed_time));
        let moving_time = sum_optional(self.laps.iter().map(|l| l.moving_time));

        let activity = Activity {
            activity_id,
            name: self.name,
            description: self.description,
            sport: self.sport,
            sub_sport: self.sub_sport,
            start_time,
            stop_time,
            elapsed_time,
            moving_time,
            distance,
            laps: Some(self.laps.len() as u32),
            calories: self
                .laps
                .iter()
                .filter_map(|l| l.calories)
                .reduce(|a, b| a + b),
            max_speed: self
                .laps
                .iter()
                .filter_map(|l| l.max_speed)
                .reduce(f64::max),
            start_lat: self.records.first().and_then(|r| r.position_lat),
            start_long: self.records.first().and_then(|r| r.position_long),
            stop_lat: self.records.last().and_then(|r| r.position_lat),
            stop_long: self.records.last().and_then(|r| r.position_long),
            ..Activity::default()
        };

        let mut set = RecordSet::new(activity);
        set.laps = self.laps;
        set.records = self.records;
        Ok(set)
    }
}

fn parse_time(path: &Path, value: &str) -> ImportResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ImportError::decode(path, format!("bad timestamp {:?}: {}", value, e)))
}

fn parse_time_opt(value: &str) -> Option<DateTime<Utc>> {
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

/// Sum of present values; None when every input is absent.
fn sum_optional(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().reduce(|a, b| a + b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_axf(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    const FULL_FILE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ActivityLog>
  <Activity id="act-77" sport="running" sub_sport="trail">
    <Name>Morning Run</Name>
    <Lap start_time="2023-11-14T06:00:00Z">
      <TotalTime>600.0</TotalTime>
      <Distance>1000.0</Distance>
      <Calories>55</Calories>
      <AvgHr>140</AvgHr>
      <MaxSpeed>3.5</MaxSpeed>
      <Point>
        <Time>2023-11-14T06:00:00Z</Time>
        <Lat>47.61</Lat>
        <Lon>-122.33</Lon>
        <Alt>120.0</Alt>
        <Hr>138</Hr>
        <Speed>2.8</Speed>
      </Point>
      <Point>
        <Time>2023-11-14T06:05:00Z</Time>
        <Lat>47.62</Lat>
        <Lon>-122.34</Lon>
        <Hr>145</Hr>
      </Point>
    </Lap>
    <Lap start_time="2023-11-14T06:10:00Z">
      <TotalTime>580.0</TotalTime>
      <Distance>1000.0</Distance>
      <Calories>52</Calories>
      <Point>
        <Time>2023-11-14T06:10:00Z</Time>
        <Lat>47.63</Lat>
        <Lon>-122.35</Lon>
      </Point>
    </Lap>
  </Activity>
</ActivityLog>
"#;

    #[test]
    fn decodes_full_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_axf(&dir, "run.axf", FULL_FILE);
        let set = decode(&path).unwrap();

        assert_eq!(set.activity.activity_id, "act-77");
        assert_eq!(set.activity.name.as_deref(), Some("Morning Run"));
        assert_eq!(set.activity.sport, Some(Sport::Running));
        assert_eq!(set.activity.laps, Some(2));
        assert!((set.activity.distance.unwrap() - 2.0).abs() < 1e-9);
        assert!((set.activity.elapsed_time.unwrap() - 1180.0).abs() < 1e-9);
        assert_eq!(set.activity.calories, Some(107));

        assert_eq!(set.laps.len(), 2);
        assert_eq!(set.laps[0].lap, 0);
        assert_eq!(set.laps[1].lap, 1);
        assert_eq!(set.laps[0].avg_hr, Some(140));
        // 3.5 m/s -> 12.6 kph
        assert!((set.laps[0].max_speed.unwrap() - 12.6).abs() < 1e-9);
        // derived stop time = start + total time
        assert_eq!(
            set.laps[0].stop_time.unwrap(),
            set.laps[0].start_time.unwrap() + Duration::seconds(600)
        );

        assert_eq!(set.records.len(), 3);
        assert_eq!(set.records[2].record, 2);
        assert_eq!(set.records[0].hr, Some(138));
        assert_eq!(set.records[1].altitude, None);
        assert_eq!(set.activity.start_lat, Some(47.61));
        assert_eq!(set.activity.stop_long, Some(-122.35));
    }

    #[test]
    fn decodes_lap_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let fragment = r#"<Lap start_time="2023-11-14T06:00:00Z">
  <TotalTime>300.0</TotalTime>
  <Distance>800.0</Distance>
  <Point>
    <Time>2023-11-14T06:00:00Z</Time>
    <Lat>47.6</Lat>
    <Lon>-122.3</Lon>
  </Point>
</Lap>
"#;
        let path = write_axf(&dir, "lap0.axf", fragment);
        let set = decode(&path).unwrap();

        assert_eq!(set.laps.len(), 1);
        assert_eq!(set.records.len(), 1);
        assert_eq!(set.activity.sport, None);
        // identifier derived from the fragment's start time
        let start = set.laps[0].start_time.unwrap().timestamp();
        assert_eq!(set.activity.activity_id, format!("xchg-{}", start));
    }

    #[test]
    fn missing_optional_fields_stay_unset() {
        let dir = tempfile::tempdir().unwrap();
        let sparse = r#"<ActivityLog>
  <Activity sport="cycling">
    <Lap start_time="2023-11-14T06:00:00Z">
      <TotalTime>60.0</TotalTime>
    </Lap>
  </Activity>
</ActivityLog>
"#;
        let path = write_axf(&dir, "sparse.axf", sparse);
        let set = decode(&path).unwrap();

        assert_eq!(set.activity.distance, None);
        assert_eq!(set.activity.calories, None);
        assert_eq!(set.laps[0].avg_hr, None);
        assert!(set.records.is_empty());
    }

    #[test]
    fn malformed_xml_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_axf(&dir, "broken.axf", "<ActivityLog><Activity></ActivityLog>");
        assert!(matches!(decode(&path), Err(ImportError::Decode { .. })));
    }

    #[test]
    fn unrelated_root_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_axf(&dir, "other.axf", "<Settings><Volume>3</Volume></Settings>");
        assert!(matches!(decode(&path), Err(ImportError::Decode { .. })));
    }

    #[test]
    fn empty_file_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_axf(&dir, "empty.axf", "  \n");
        assert!(matches!(decode(&path), Err(ImportError::EmptyInput(_))));
    }
}
