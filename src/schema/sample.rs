//! Decoded ride sample schema
//!
//! The decoding collaborator (FIT reader, export tool, ...) hands the engine a
//! list of `(timestamp, power)` pairs per ride. This module defines that
//! boundary:
//! - timestamps as ISO-8601 text (with or without offset) or epoch seconds
//! - power as watts, or null when the device recorded no reading

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp as supplied by the decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleTimestamp {
    /// Seconds since the Unix epoch (UTC)
    Epoch(f64),
    /// ISO-8601 / RFC 3339 text, or epoch seconds as text
    Text(String),
}

impl SampleTimestamp {
    /// Resolve to an instant, or `None` if the value is unusable.
    ///
    /// Text without an offset is taken as wall-clock time and kept as-is
    /// (offset `+00:00`); no timezone conversion is performed.
    pub fn resolve(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            SampleTimestamp::Epoch(secs) => from_epoch_seconds(*secs),
            SampleTimestamp::Text(text) => parse_text_timestamp(text.trim()),
        }
    }
}

impl From<DateTime<FixedOffset>> for SampleTimestamp {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        SampleTimestamp::Text(ts.to_rfc3339())
    }
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<FixedOffset>> {
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .map(|ts| ts.fixed_offset())
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts);
    }
    text.parse::<f64>().ok().and_then(from_epoch_seconds)
}

/// One decoded sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub timestamp: Option<SampleTimestamp>,
    #[serde(default, alias = "power")]
    pub power_watts: Option<f64>,
}

impl RawSample {
    pub fn new(timestamp: impl Into<SampleTimestamp>, power_watts: Option<f64>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            power_watts,
        }
    }

    /// Resolved timestamp, if any
    pub fn resolved_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.timestamp.as_ref().and_then(SampleTimestamp::resolve)
    }
}

/// A JSON ride file: bare sample array or an object with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RideFile {
    Samples(Vec<RawSample>),
    Ride {
        #[serde(default)]
        ride_id: Option<String>,
        samples: Vec<RawSample>,
    },
}

/// Decoded samples for one ride, ready for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideInput {
    pub ride_id: String,
    pub samples: Vec<RawSample>,
}

impl RideInput {
    pub fn new(ride_id: impl Into<String>, samples: Vec<RawSample>) -> Self {
        Self {
            ride_id: ride_id.into(),
            samples,
        }
    }

    /// Sort samples chronologically; samples without a usable timestamp go last.
    ///
    /// Timestamps compare at full precision. The sort is stable, so duplicate
    /// timestamps stay adjacent and are rejected later by the normalizer.
    pub fn sort_by_timestamp(&mut self) {
        self.samples.sort_by_cached_key(|s| {
            let ts = s.resolved_timestamp();
            (ts.is_none(), ts)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rfc3339_keeps_offset() {
        let ts = SampleTimestamp::Text("2025-10-12T07:30:00+02:00".to_string())
            .resolve()
            .unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 7200);
        assert_eq!(ts.format("%H:%M").to_string(), "07:30");
    }

    #[test]
    fn test_resolve_naive_and_epoch() {
        let naive = SampleTimestamp::Text("2025-01-01T00:00:05".to_string())
            .resolve()
            .unwrap();
        assert_eq!(naive.to_rfc3339(), "2025-01-01T00:00:05+00:00");

        let epoch = SampleTimestamp::Epoch(1_735_689_605.0).resolve().unwrap();
        assert_eq!(epoch, naive);

        let epoch_text = SampleTimestamp::Text("1735689605".to_string())
            .resolve()
            .unwrap();
        assert_eq!(epoch_text, naive);
    }

    #[test]
    fn test_unusable_timestamps() {
        assert!(SampleTimestamp::Text("".to_string()).resolve().is_none());
        assert!(SampleTimestamp::Text("yesterday".to_string()).resolve().is_none());
        assert!(SampleTimestamp::Epoch(f64::NAN).resolve().is_none());
    }

    #[test]
    fn test_deserialize_samples() {
        let json = r#"[
            {"timestamp": "2025-01-01T00:00:00Z", "power_watts": 210.0},
            {"timestamp": 1735689601, "power": null},
            {"power_watts": 180}
        ]"#;
        let samples: Vec<RawSample> = serde_json::from_str(json).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].power_watts, Some(210.0));
        assert!(samples[1].resolved_timestamp().is_some());
        assert_eq!(samples[1].power_watts, None);
        assert!(samples[2].timestamp.is_none());
    }

    #[test]
    fn test_ride_file_shapes() {
        let bare: RideFile = serde_json::from_str(r#"[{"timestamp": 0, "power_watts": 1}]"#).unwrap();
        assert!(matches!(bare, RideFile::Samples(ref s) if s.len() == 1));

        let wrapped: RideFile =
            serde_json::from_str(r#"{"ride_id": "morning", "samples": []}"#).unwrap();
        assert!(matches!(wrapped, RideFile::Ride { ride_id: Some(ref id), .. } if id == "morning"));
    }

    #[test]
    fn test_sort_by_timestamp() {
        let mut ride = RideInput::new(
            "r",
            vec![
                RawSample::new(SampleTimestamp::Epoch(20.0), Some(2.0)),
                RawSample {
                    timestamp: None,
                    power_watts: Some(9.0),
                },
                RawSample::new(SampleTimestamp::Epoch(10.0), Some(1.0)),
            ],
        );
        ride.sort_by_timestamp();
        let powers: Vec<_> = ride.samples.iter().map(|s| s.power_watts).collect();
        assert_eq!(powers, vec![Some(1.0), Some(2.0), Some(9.0)]);
    }

    #[test]
    fn test_sort_orders_sub_millisecond_timestamps() {
        let text = |t: &str| SampleTimestamp::Text(t.to_string());
        let mut ride = RideInput::new(
            "sub-ms",
            vec![
                RawSample::new(text("2025-10-07T06:00:00.0005Z"), Some(2.0)),
                RawSample::new(text("2025-10-07T06:00:00.0001Z"), Some(1.0)),
                RawSample::new(text("2025-10-07T06:00:01Z"), Some(3.0)),
            ],
        );
        ride.sort_by_timestamp();
        let powers: Vec<_> = ride.samples.iter().map(|s| s.power_watts).collect();
        assert_eq!(powers, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }
}
