//! Core types for the powerweek pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: normalized sample series, per-ride metrics, weekly summaries and
//! the final report.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MetricsConfig;
use crate::week::WeekKey;

/// One timestamped power reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample time in the ride's own offset
    pub timestamp: DateTime<FixedOffset>,
    /// Power in watts; `None` means no reading, which is not the same as 0 W
    pub power_watts: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: DateTime<FixedOffset>, power_watts: Option<f64>) -> Self {
        Self {
            timestamp,
            power_watts,
        }
    }

    /// Whether this sample carries a power reading
    pub fn is_present(&self) -> bool {
        self.power_watts.is_some()
    }
}

/// Validated, time-ordered samples for a single ride
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideSeries {
    /// Ride identifier (usually the source file stem)
    pub ride_id: String,
    /// Timestamp of the first valid sample
    pub start_time: DateTime<FixedOffset>,
    /// Strictly increasing samples, absent-power samples included
    pub samples: Vec<Sample>,
    /// Input samples discarded for lacking a usable timestamp
    pub dropped_samples: usize,
}

impl RideSeries {
    /// Iterate over samples that carry a power reading
    pub fn present(&self) -> impl Iterator<Item = (DateTime<FixedOffset>, f64)> + '_ {
        self.samples
            .iter()
            .filter_map(|s| s.power_watts.map(|p| (s.timestamp, p)))
    }

    /// Number of samples with a power reading
    pub fn present_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_present()).count()
    }
}

/// Data quality flags attached to a ride that was still aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Power data present but no sample above 0 W
    EmptyNonCoastingSet,
    /// Some input samples had no usable timestamp
    DroppedSamples,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityFlag::EmptyNonCoastingSet => "empty_non_coasting_set",
            QualityFlag::DroppedSamples => "dropped_samples",
        }
    }
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics derived from one ride
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideMetrics {
    pub ride_id: String,
    pub start_time: DateTime<FixedOffset>,
    /// Mean of present power samples (watts)
    pub avg_watts: f64,
    /// Normalized Power (watts)
    pub normalized_power: f64,
    /// Mean of samples above 0 W; `None` when the ride never left 0 W
    pub noncoasting_avg_watts: Option<f64>,
    /// Integrated work (kJ), gaps capped
    pub total_kj: f64,
    /// Number of present power samples
    pub sample_count: usize,
    pub week_key: WeekKey,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality_flags: Vec<QualityFlag>,
}

/// Why a ride was left out of the weekly aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Too few timestamped samples, or timestamps not strictly increasing
    InvalidRide,
    /// No sample carries a power reading
    NoPowerData,
    /// Negative or non-finite power reading
    InvalidSample,
    /// The ride file could not be decoded
    Unreadable,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InvalidRide => "invalid_ride",
            SkipReason::NoPowerData => "no_power_data",
            SkipReason::InvalidSample => "invalid_sample",
            SkipReason::Unreadable => "unreadable",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ride excluded from aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRide {
    pub ride_id: String,
    pub reason: SkipReason,
    pub message: String,
}

/// A partial-data warning for a ride that was still aggregated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideWarning {
    pub ride_id: String,
    pub flag: QualityFlag,
}

/// Finalized summary for one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week: WeekKey,
    /// Mean of the rides' average power
    pub avg_watts: f64,
    /// Mean of the rides' Normalized Power
    pub avg_np: f64,
    /// Mean of the rides' non-coasting average, over rides that have one
    pub avg_noncoasting_watts: Option<f64>,
    pub ride_count: usize,
    /// Sum of the rides' work (kJ)
    pub total_kj: f64,
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub run_id: String,
}

/// Complete outcome of one summarization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub producer: ReportProducer,
    pub generated_at: DateTime<Utc>,
    pub config: MetricsConfig,
    /// Weekly rows, ascending by week
    pub weeks: Vec<WeeklySummary>,
    /// Per-ride metrics for every aggregated ride
    pub rides: Vec<RideMetrics>,
    pub skipped: Vec<SkippedRide>,
    pub warnings: Vec<RideWarning>,
}

impl WeeklyReport {
    /// Number of rides submitted to the run, aggregated or not
    pub fn total_rides(&self) -> usize {
        self.rides.len() + self.skipped.len()
    }

    /// Skipped ride counts grouped by reason, in a stable order
    pub fn skip_counts(&self) -> Vec<(SkipReason, usize)> {
        [
            SkipReason::InvalidRide,
            SkipReason::NoPowerData,
            SkipReason::InvalidSample,
            SkipReason::Unreadable,
        ]
        .into_iter()
        .map(|reason| {
            let count = self.skipped.iter().filter(|s| s.reason == reason).count();
            (reason, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
    }
}
