//! Garmin TrainingCenterDatabase v2 XML emitter, matching the reference
//! client's `TCXConverter`: one `Lap` covering the whole session, one
//! `Trackpoint` per sample. Refuses non-GPS sessions the way the
//! reference converter does.

use std::fmt::Write as _;
use std::path::Path;

use chrono::Duration;

use crate::decoder::{max_speed, total_distance, Sample, SessionMetadata};

use super::{out_path, ConverterError};

const SUFFIX: &str = ".tcx";
const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Renders `metadata` + `samples` as a TCX document string. `sport` is
/// the `Activity`'s `Sport` attribute (the reference client defaults
/// this to `"Other"`).
pub fn to_string(metadata: &SessionMetadata, samples: &[Sample], sport: &str) -> Result<String, ConverterError> {
    if !metadata.has_gps {
        return Err(ConverterError::MissingGps);
    }

    let start_time = metadata.start_utc.format(ISO8601_FORMAT).to_string();
    let mut out = String::new();

    writeln!(out, r#"<?xml version='1.0' encoding='utf-8'?>"#).ok();
    writeln!(
        out,
        r#"<TrainingCenterDatabase xsi:schemaLocation="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2 http://www.garmin.com/xmlschemas/TrainingCenterDatabasev2.xsd" xmlns:ns5="http://www.garmin.com/xmlschemas/ActivityGoals/v1" xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2" xmlns:ns2="http://www.garmin.com/xmlschemas/UserProfile/v2" xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#
    )
    .ok();
    writeln!(out, "<Activities>").ok();
    writeln!(out, r#"<Activity Sport="{}">"#, escape(sport)).ok();
    writeln!(out, "<Id>{}</Id>", start_time).ok();
    writeln!(out, r#"<Lap StartTime="{}">"#, start_time).ok();
    writeln!(out, "<TotalTimeSeconds>{}</TotalTimeSeconds>", metadata.duration_secs).ok();
    writeln!(out, "<DistanceMeters>{:.2}</DistanceMeters>", total_distance(samples)).ok();
    writeln!(out, "<MaximumSpeed>{:.1}</MaximumSpeed>", max_speed(samples)).ok();
    writeln!(out, "<AverageHeartRateBpm><Value>{}</Value></AverageHeartRateBpm>", metadata.hr_avg).ok();
    writeln!(out, "<MaximumHeartRateBpm><Value>{}</Value></MaximumHeartRateBpm>", metadata.hr_max).ok();
    writeln!(out, "<Intensity>Active</Intensity>").ok();
    writeln!(out, "<TriggerMethod>Manual</TriggerMethod>").ok();
    writeln!(out, "<Track>").ok();

    let mut running_distance = 0.0_f64;
    for (index, sample) in samples.iter().enumerate() {
        let time = metadata.start_utc
            + Duration::seconds(metadata.sample_rate_seconds as i64 * index as i64);

        writeln!(out, "<Trackpoint>").ok();
        writeln!(out, "<Time>{}</Time>", time.format(ISO8601_FORMAT)).ok();
        writeln!(out, "<Position>").ok();
        writeln!(out, "<LatitudeDegrees>{:.7}</LatitudeDegrees>", sample.lat).ok();
        writeln!(out, "<LongitudeDegrees>{:.7}</LongitudeDegrees>", sample.lon).ok();
        writeln!(out, "</Position>").ok();

        running_distance += sample.distance;
        writeln!(out, "<DistanceMeters>{:.1}</DistanceMeters>", running_distance).ok();

        if metadata.has_hr {
            let hr = sample.hr.unwrap_or(0);
            writeln!(out, "<HeartRateBpm><Value>{}</Value></HeartRateBpm>", hr).ok();
        }

        writeln!(out, "<Extensions>").ok();
        writeln!(out, "<TPX>").ok();
        writeln!(out, "<Speed>{:.1}</Speed>", sample.speed).ok();
        writeln!(out, "</TPX>").ok();
        writeln!(out, "</Extensions>").ok();
        writeln!(out, "</Trackpoint>").ok();
    }

    writeln!(out, "</Track>").ok();
    writeln!(out, "</Lap>").ok();
    writeln!(out, "</Activity>").ok();
    writeln!(out, "</Activities>").ok();
    writeln!(out, "</TrainingCenterDatabase>").ok();

    Ok(out)
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Writes the TCX document to `<out_dir>/<base_filename>.tcx`.
pub fn write(
    metadata: &SessionMetadata,
    samples: &[Sample],
    sport: &str,
    out_dir: &Path,
) -> Result<(), ConverterError> {
    let document = to_string(metadata, samples, sport)?;
    let path = out_path(out_dir, metadata, SUFFIX);
    std::fs::write(&path, document).map_err(|source| ConverterError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn metadata(has_gps: bool) -> SessionMetadata {
        let naive = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        SessionMetadata {
            start_local: naive,
            start_utc: Utc.from_utc_datetime(&naive),
            duration_secs: 3600,
            duration_tenths: 0,
            hr_max: 180,
            hr_min: 60,
            hr_avg: 140,
            user_hr_max: 190,
            user_hr_min: 50,
            user_hr_rest: 55,
            has_hr: true,
            has_gps,
            sample_rate_seconds: 5,
        }
    }

    fn sample(lat: f64, lon: f64, distance: f64, speed: f64) -> Sample {
        Sample {
            hr: Some(150),
            lon,
            lat,
            distance,
            speed,
        }
    }

    #[test]
    fn refuses_sessions_without_gps() {
        let meta = metadata(false);
        let err = to_string(&meta, &[], "Running").unwrap_err();
        assert!(matches!(err, ConverterError::MissingGps));
    }

    #[test]
    fn renders_one_trackpoint_per_sample() {
        let meta = metadata(true);
        let samples = vec![sample(54.0, 39.0, 0.0, 0.0), sample(54.001, 39.001, 12.3, 2.46)];
        let doc = to_string(&meta, &samples, "Running").unwrap();
        assert_eq!(doc.matches("<Trackpoint>").count(), 2);
        assert!(doc.contains(r#"Sport="Running""#));
        assert!(doc.contains("<LatitudeDegrees>54.0010000</LatitudeDegrees>"));
    }
}
