//! Sample series normalization
//!
//! This module turns one ride's decoded samples into a validated series:
//! - Samples without a usable timestamp are dropped and counted
//! - Absent-power samples are kept so gaps stay visible
//! - Timestamps must be strictly increasing
//!
//! No interpolation happens here; gaps are handled by the metrics calculator.

use tracing::debug;

use crate::error::ComputeError;
use crate::schema::RawSample;
use crate::types::{RideSeries, Sample};

/// Minimum number of timestamped samples for a ride to be usable
pub const MIN_TIMESTAMPED_SAMPLES: usize = 2;

/// Normalizer for converting decoded samples to a ride series
pub struct SeriesNormalizer;

impl SeriesNormalizer {
    /// Normalize one ride's samples
    pub fn normalize(ride_id: &str, raw: &[RawSample]) -> Result<RideSeries, ComputeError> {
        let samples: Vec<Sample> = raw
            .iter()
            .filter_map(|s| {
                s.resolved_timestamp()
                    .map(|ts| Sample::new(ts, s.power_watts))
            })
            .collect();
        let dropped_samples = raw.len() - samples.len();

        if dropped_samples > 0 {
            debug!(ride_id, dropped_samples, "dropped samples without a usable timestamp");
        }

        if samples.len() < MIN_TIMESTAMPED_SAMPLES {
            return Err(ComputeError::InvalidRide(format!(
                "ride '{ride_id}' has {} timestamped sample(s), at least {MIN_TIMESTAMPED_SAMPLES} required",
                samples.len()
            )));
        }

        if let Some(pair) = samples
            .windows(2)
            .find(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            let problem = if pair[1].timestamp == pair[0].timestamp {
                "duplicate timestamp"
            } else {
                "timestamps out of order"
            };
            return Err(ComputeError::InvalidRide(format!(
                "ride '{ride_id}': {problem} at {}",
                pair[1].timestamp.to_rfc3339()
            )));
        }

        Ok(RideSeries {
            ride_id: ride_id.to_string(),
            start_time: samples[0].timestamp,
            samples,
            dropped_samples,
        })
    }
}
