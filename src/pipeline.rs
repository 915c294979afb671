//! Pipeline orchestration
//!
//! This module provides the public API for powerweek.
//! It orchestrates the full pipeline from decoded ride samples to weekly
//! summaries.

use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::WeeklyAggregator;
use crate::config::MetricsConfig;
use crate::error::ComputeError;
use crate::metrics::RideMetricsCalculator;
use crate::normalizer::SeriesNormalizer;
use crate::schema::{RideFileAdapter, RideInput};
use crate::types::{
    ReportProducer, RideMetrics, RideWarning, SkipReason, SkippedRide, WeeklyReport,
};
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::Utc;

/// Compute metrics for a single ride.
///
/// Pipeline stages:
/// 1. SeriesNormalizer - Validate timestamps and keep absent-power samples
/// 2. RideMetricsCalculator - Average power, NP, non-coasting average, kJ, week
pub fn analyze_ride(ride: &RideInput, config: &MetricsConfig) -> Result<RideMetrics, ComputeError> {
    let series = SeriesNormalizer::normalize(&ride.ride_id, &ride.samples)?;
    let metrics = RideMetricsCalculator::compute(&series, config)?;
    debug!(
        ride_id = %metrics.ride_id,
        week = %metrics.week_key,
        avg_watts = metrics.avg_watts,
        normalized_power = metrics.normalized_power,
        "computed ride metrics"
    );
    Ok(metrics)
}

/// Summarize a batch of rides into weekly rows.
///
/// The configuration is validated before any ride is touched. Rides are
/// analyzed in parallel; rides that fail are reported in
/// [`WeeklyReport::skipped`] and never abort the run.
///
/// # Example
/// ```ignore
/// let report = summarize_rides(rides, &MetricsConfig::default())?;
/// for week in &report.weeks {
///     println!("{} {:.0} W", week.week, week.avg_watts);
/// }
/// ```
pub fn summarize_rides(
    rides: Vec<RideInput>,
    config: &MetricsConfig,
) -> Result<WeeklyReport, ComputeError> {
    let mut processor = WeeklyProcessor::new(config.clone())?;
    processor.process_all(rides)?;
    Ok(processor.finish())
}

/// Summarize every decoded ride file in a directory.
///
/// Files that fail to decode are reported as [`SkipReason::Unreadable`].
/// A missing directory yields an empty report.
pub fn summarize_directory(
    dir: &Path,
    config: &MetricsConfig,
) -> Result<WeeklyReport, ComputeError> {
    let mut processor = WeeklyProcessor::new(config.clone())?;
    let loaded = RideFileAdapter::load_directory(dir)?;
    info!(
        dir = %dir.display(),
        rides = loaded.rides.len(),
        unreadable = loaded.unreadable.len(),
        "loaded ride directory"
    );

    for unreadable in loaded.unreadable {
        processor.record_unreadable(unreadable.ride_id, unreadable.error.to_string());
    }
    processor.process_all(loaded.rides)?;
    Ok(processor.finish())
}

/// Stateful processor for incremental summarization.
///
/// Use this when rides arrive one at a time. Results do not depend on the
/// order rides are processed in.
pub struct WeeklyProcessor {
    config: MetricsConfig,
    run_id: String,
    rides: Vec<RideMetrics>,
    skipped: Vec<SkippedRide>,
}

impl WeeklyProcessor {
    /// Create a processor, validating the configuration
    pub fn new(config: MetricsConfig) -> Result<Self, ComputeError> {
        Self::with_run_id(config, Uuid::new_v4().to_string())
    }

    /// Create a processor with a specific run ID
    pub fn with_run_id(config: MetricsConfig, run_id: String) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            run_id,
            rides: Vec::new(),
            skipped: Vec::new(),
        })
    }

    /// Analyze one ride; returns whether it will be aggregated
    pub fn process(&mut self, ride: RideInput) -> Result<bool, ComputeError> {
        let result = analyze_ride(&ride, &self.config);
        self.record(ride.ride_id, result)
    }

    /// Analyze a batch of rides on the rayon pool
    pub fn process_all(&mut self, rides: Vec<RideInput>) -> Result<(), ComputeError> {
        let config = &self.config;
        let results: Vec<(String, Result<RideMetrics, ComputeError>)> = rides
            .into_par_iter()
            .map(|ride| {
                let result = analyze_ride(&ride, config);
                (ride.ride_id, result)
            })
            .collect();

        for (ride_id, result) in results {
            self.record(ride_id, result)?;
        }
        Ok(())
    }

    /// Record a ride whose file could not be decoded
    pub fn record_unreadable(&mut self, ride_id: impl Into<String>, message: impl Into<String>) {
        self.skip(ride_id.into(), SkipReason::Unreadable, message.into());
    }

    /// Number of rides processed so far, aggregated or skipped
    pub fn processed_count(&self) -> usize {
        self.rides.len() + self.skipped.len()
    }

    /// Aggregate everything processed so far into a report
    pub fn finish(mut self) -> WeeklyReport {
        // Fixed summation order regardless of completion order
        self.rides.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.ride_id.cmp(&b.ride_id))
        });
        self.skipped.sort_by(|a, b| a.ride_id.cmp(&b.ride_id));

        let mut aggregator = WeeklyAggregator::new();
        aggregator.extend(&self.rides);
        let weeks = aggregator.finalize();

        let warnings: Vec<RideWarning> = self
            .rides
            .iter()
            .flat_map(|ride| {
                ride.quality_flags.iter().map(|flag| RideWarning {
                    ride_id: ride.ride_id.clone(),
                    flag: *flag,
                })
            })
            .collect();

        info!(
            run_id = %self.run_id,
            rides = self.rides.len(),
            skipped = self.skipped.len(),
            weeks = weeks.len(),
            "weekly summary complete"
        );

        WeeklyReport {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                run_id: self.run_id,
            },
            generated_at: Utc::now(),
            config: self.config,
            weeks,
            rides: self.rides,
            skipped: self.skipped,
            warnings,
        }
    }

    fn record(
        &mut self,
        ride_id: String,
        result: Result<RideMetrics, ComputeError>,
    ) -> Result<bool, ComputeError> {
        match result {
            Ok(metrics) => {
                for flag in &metrics.quality_flags {
                    warn!(ride_id = %metrics.ride_id, %flag, "partial ride data");
                }
                self.rides.push(metrics);
                Ok(true)
            }
            Err(error) => match error.skip_reason() {
                Some(reason) => {
                    self.skip(ride_id, reason, error.to_string());
                    Ok(false)
                }
                None => Err(error),
            },
        }
    }

    fn skip(&mut self, ride_id: String, reason: SkipReason, message: String) {
        warn!(ride_id = %ride_id, %reason, message = %message, "skipping ride");
        self.skipped.push(SkippedRide {
            ride_id,
            reason,
            message,
        });
    }
}
