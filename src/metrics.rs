//! Ride metrics derivation
//!
//! This module derives per-ride power metrics from a normalized series:
//! - Average power over present samples
//! - Normalized Power from a trailing time-based rolling average
//! - Non-coasting average power (samples above 0 W)
//! - Total work in kJ with a cap on integrated time steps
//!
//! Absent-power samples never count as 0 W. They are skipped by every
//! average, and the NP window only ever contains present samples, so a data
//! gap neither raises nor lowers NP.

use chrono::{DateTime, Duration, FixedOffset};

use crate::config::MetricsConfig;
use crate::error::ComputeError;
use crate::types::{QualityFlag, RideMetrics, RideSeries};
use crate::week::resolve_week;

/// Calculator for per-ride metrics
pub struct RideMetricsCalculator;

impl RideMetricsCalculator {
    /// Compute metrics for one ride
    pub fn compute(series: &RideSeries, config: &MetricsConfig) -> Result<RideMetrics, ComputeError> {
        validate_power(series)?;

        let avg_watts = compute_average_power(series).ok_or_else(|| {
            ComputeError::NoPowerData(format!(
                "ride '{}' has no samples with power",
                series.ride_id
            ))
        })?;

        let rolling = compute_rolling_averages(series, config.rolling_window_seconds);
        let normalized_power = compute_normalized_power(&rolling).unwrap_or(avg_watts);
        let noncoasting_avg_watts = compute_noncoasting_average(series);
        let total_kj = compute_total_kj(series, config.max_gap_seconds_for_kj);

        let mut quality_flags = Vec::new();
        if noncoasting_avg_watts.is_none() {
            quality_flags.push(QualityFlag::EmptyNonCoastingSet);
        }
        if series.dropped_samples > 0 {
            quality_flags.push(QualityFlag::DroppedSamples);
        }

        Ok(RideMetrics {
            ride_id: series.ride_id.clone(),
            start_time: series.start_time,
            avg_watts,
            normalized_power,
            noncoasting_avg_watts,
            total_kj,
            sample_count: series.present_count(),
            week_key: resolve_week(series.start_time, config.week_rule),
            quality_flags,
        })
    }
}

/// Reject the ride on any negative or non-finite power reading
fn validate_power(series: &RideSeries) -> Result<(), ComputeError> {
    match series
        .present()
        .find(|(_, power)| !power.is_finite() || *power < 0.0)
    {
        Some((ts, power)) => Err(ComputeError::InvalidSample(format!(
            "ride '{}': invalid power {power} W at {}",
            series.ride_id,
            ts.to_rfc3339()
        ))),
        None => Ok(()),
    }
}

/// Mean of present power samples
fn compute_average_power(series: &RideSeries) -> Option<f64> {
    mean(series.present().map(|(_, power)| power))
}

/// Trailing rolling average at every sample index.
///
/// The window at index i holds the present samples with timestamps in
/// `[t_i - (window_seconds - 1)s, t_i]`. Windows shorter than full width at
/// the start of the ride are kept. Indices whose window holds no present
/// sample produce no value.
fn compute_rolling_averages(series: &RideSeries, window_seconds: u32) -> Vec<f64> {
    let span = Duration::seconds(i64::from(window_seconds.saturating_sub(1)));
    let samples = &series.samples;

    let mut averages = Vec::with_capacity(samples.len());
    let mut start = 0;
    let mut sum = 0.0;
    let mut count = 0usize;

    for (i, sample) in samples.iter().enumerate() {
        if let Some(power) = sample.power_watts {
            sum += power;
            count += 1;
        }

        while start < i && sample.timestamp - samples[start].timestamp > span {
            if let Some(power) = samples[start].power_watts {
                sum -= power;
                count -= 1;
            }
            start += 1;
        }

        if count == 0 {
            // Drop accumulated rounding error once the window is empty
            sum = 0.0;
            continue;
        }
        averages.push(sum / count as f64);
    }

    averages
}

/// Fourth root of the mean fourth power of the rolling averages
fn compute_normalized_power(rolling: &[f64]) -> Option<f64> {
    let mean_fourth = mean(rolling.iter().map(|avg| avg.powi(4)))?;
    Some(mean_fourth.sqrt().sqrt())
}

/// Mean of samples strictly above 0 W
fn compute_noncoasting_average(series: &RideSeries) -> Option<f64> {
    mean(
        series
            .present()
            .map(|(_, power)| power)
            .filter(|power| *power > 0.0),
    )
}

/// Work in kJ over consecutive present samples.
///
/// Each sample is credited with the time to the next present sample, capped
/// at `max_gap_seconds` so pauses are not integrated as riding.
fn compute_total_kj(series: &RideSeries, max_gap_seconds: f64) -> f64 {
    let present: Vec<(DateTime<FixedOffset>, f64)> = series.present().collect();
    let joules: f64 = present
        .windows(2)
        .map(|pair| {
            let (t0, power) = pair[0];
            let dt = millis_between(t0, pair[1].0) as f64 / 1000.0;
            power * dt.min(max_gap_seconds)
        })
        .sum();
    joules / 1000.0
}

fn millis_between(earlier: DateTime<FixedOffset>, later: DateTime<FixedOffset>) -> i64 {
    later.signed_duration_since(earlier).num_milliseconds()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;
    use crate::week::{WeekKey, WeekRule};

    const EPS: f64 = 1e-9;

    fn start() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-10-07T06:00:00Z").unwrap()
    }

    /// 1 Hz series from a list of powers
    fn series_1hz(powers: &[Option<f64>]) -> RideSeries {
        let samples = powers
            .iter()
            .enumerate()
            .map(|(i, p)| Sample::new(start() + Duration::seconds(i as i64), *p))
            .collect();
        RideSeries {
            ride_id: "test-ride".to_string(),
            start_time: start(),
            samples,
            dropped_samples: 0,
        }
    }

    fn constant(power: f64, seconds: usize) -> Vec<Option<f64>> {
        vec![Some(power); seconds]
    }

    fn compute(series: &RideSeries) -> RideMetrics {
        RideMetricsCalculator::compute(series, &MetricsConfig::default()).unwrap()
    }

    #[test]
    fn test_constant_power_np_equals_average() {
        for power in [120.0, 250.0, 1500.0] {
            let metrics = compute(&series_1hz(&constant(power, 60)));
            assert!((metrics.avg_watts - power).abs() < EPS);
            assert!((metrics.normalized_power - power).abs() < EPS);
            assert_eq!(metrics.noncoasting_avg_watts, Some(power));
            assert_eq!(metrics.sample_count, 60);
        }
    }

    #[test]
    fn test_short_ride_uses_partial_windows() {
        let metrics = compute(&series_1hz(&constant(150.0, 10)));
        assert!((metrics.normalized_power - 150.0).abs() < EPS);
    }

    #[test]
    fn test_variable_power_raises_np() {
        let mut varied = constant(100.0, 60);
        varied.extend(constant(300.0, 60));
        let varied = compute(&series_1hz(&varied));
        let steady = compute(&series_1hz(&constant(200.0, 120)));

        assert!((varied.avg_watts - steady.avg_watts).abs() < EPS);
        assert!((steady.normalized_power - steady.avg_watts).abs() < EPS);
        assert!(varied.normalized_power > varied.avg_watts);
        assert!(varied.normalized_power > steady.normalized_power);
    }

    #[test]
    fn test_window_is_trailing_and_inclusive() {
        let config = MetricsConfig {
            rolling_window_seconds: 2,
            ..MetricsConfig::default()
        };
        let series = series_1hz(&[Some(100.0), Some(300.0), Some(100.0)]);
        let metrics = RideMetricsCalculator::compute(&series, &config).unwrap();

        // windows: [100], [100, 300], [300, 100]
        let expected = ((100f64.powi(4) + 2.0 * 200f64.powi(4)) / 3.0).powf(0.25);
        assert!((metrics.normalized_power - expected).abs() < 1e-6);
    }

    #[test]
    fn test_window_edge_with_irregular_spacing() {
        let at = |ms: i64, power: Option<f64>| Sample::new(start() + Duration::milliseconds(ms), power);
        let series = RideSeries {
            ride_id: "irregular".to_string(),
            start_time: start(),
            samples: vec![
                at(0, Some(100.0)),
                at(500, Some(300.0)),
                at(10_250, None),
                // 29.5 s after the first sample, exactly 29 s after the second
                at(29_500, Some(200.0)),
            ],
            dropped_samples: 0,
        };

        let rolling = compute_rolling_averages(&series, 30);
        assert_eq!(rolling, vec![100.0, 200.0, 200.0, 250.0]);

        let metrics = compute(&series);
        let expected = ((100f64.powi(4) + 2.0 * 200f64.powi(4) + 250f64.powi(4)) / 4.0).powf(0.25);
        assert!((metrics.normalized_power - expected).abs() < 1e-6);
        assert_eq!(metrics.sample_count, 3);
    }

    #[test]
    fn test_gaps_are_invisible_to_np() {
        let mut powers = constant(200.0, 30);
        powers.extend(vec![None; 60]);
        powers.extend(constant(200.0, 30));
        let metrics = compute(&series_1hz(&powers));

        assert!((metrics.avg_watts - 200.0).abs() < EPS);
        assert!((metrics.normalized_power - 200.0).abs() < EPS);
        assert_eq!(metrics.sample_count, 60);
    }

    #[test]
    fn test_rolling_window_slides_past_old_samples() {
        // 30 s at 100 W then 30 s at 400 W: the last window holds only 400 W samples
        let mut powers = constant(100.0, 30);
        powers.extend(constant(400.0, 30));
        let rolling = compute_rolling_averages(&series_1hz(&powers), 30);

        assert_eq!(rolling.len(), 60);
        assert!((rolling[29] - 100.0).abs() < EPS);
        assert!((rolling[30] - (29.0 * 100.0 + 400.0) / 30.0).abs() < EPS);
        assert!((rolling[59] - 400.0).abs() < EPS);
    }

    #[test]
    fn test_noncoasting_average() {
        let coasting = compute(&series_1hz(&[
            Some(200.0),
            Some(0.0),
            Some(200.0),
            Some(0.0),
            None,
        ]));
        assert!((coasting.avg_watts - 100.0).abs() < EPS);
        assert_eq!(coasting.noncoasting_avg_watts, Some(200.0));
        assert!(coasting.noncoasting_avg_watts.unwrap() >= coasting.avg_watts);

        let pedalling = compute(&series_1hz(&[Some(180.0), Some(220.0)]));
        assert_eq!(pedalling.noncoasting_avg_watts, Some(pedalling.avg_watts));
    }

    #[test]
    fn test_all_coasting_flags_empty_noncoasting_set() {
        let metrics = compute(&series_1hz(&constant(0.0, 20)));
        assert_eq!(metrics.avg_watts, 0.0);
        assert_eq!(metrics.normalized_power, 0.0);
        assert_eq!(metrics.noncoasting_avg_watts, None);
        assert!(metrics
            .quality_flags
            .contains(&QualityFlag::EmptyNonCoastingSet));
    }

    #[test]
    fn test_total_kj_caps_gaps() {
        // 1 Hz: each of the first 59 samples is credited 1 s
        let metrics = compute(&series_1hz(&constant(250.0, 60)));
        assert!((metrics.total_kj - 250.0 * 59.0 / 1000.0).abs() < EPS);

        // A ten-minute pause is credited only the 5 s cap
        let paused = RideSeries {
            ride_id: "paused".to_string(),
            start_time: start(),
            samples: vec![
                Sample::new(start(), Some(200.0)),
                Sample::new(start() + Duration::seconds(300), None),
                Sample::new(start() + Duration::seconds(600), Some(200.0)),
            ],
            dropped_samples: 0,
        };
        let metrics = compute(&paused);
        assert!((metrics.total_kj - 1.0).abs() < EPS);
    }

    #[test]
    fn test_total_kj_respects_configured_cap() {
        let config = MetricsConfig {
            max_gap_seconds_for_kj: 2.0,
            ..MetricsConfig::default()
        };
        let series = RideSeries {
            ride_id: "sparse".to_string(),
            start_time: start(),
            samples: vec![
                Sample::new(start(), Some(100.0)),
                Sample::new(start() + Duration::seconds(3), Some(100.0)),
                Sample::new(start() + Duration::milliseconds(4500), Some(100.0)),
            ],
            dropped_samples: 0,
        };
        let metrics = RideMetricsCalculator::compute(&series, &config).unwrap();
        // 100 W * 2 s (capped) + 100 W * 1.5 s
        assert!((metrics.total_kj - 0.35).abs() < EPS);
    }

    #[test]
    fn test_negative_power_rejects_ride() {
        let err = RideMetricsCalculator::compute(
            &series_1hz(&[Some(200.0), Some(-5.0), Some(200.0)]),
            &MetricsConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ComputeError::InvalidSample(_)));

        let err = RideMetricsCalculator::compute(
            &series_1hz(&[Some(200.0), Some(f64::NAN)]),
            &MetricsConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ComputeError::InvalidSample(_)));
    }

    #[test]
    fn test_no_power_data() {
        let err = RideMetricsCalculator::compute(&series_1hz(&[None, None, None]), &MetricsConfig::default())
            .unwrap_err();
        assert!(matches!(err, ComputeError::NoPowerData(_)));
    }

    #[test]
    fn test_week_key_follows_rule() {
        let series = series_1hz(&constant(200.0, 5));
        let iso = compute(&series);
        assert_eq!(iso.week_key.to_string(), "2025-W41");

        let config = MetricsConfig {
            week_rule: WeekRule::Sunday,
            ..MetricsConfig::default()
        };
        let sunday = RideMetricsCalculator::compute(&series, &config).unwrap();
        assert_eq!(sunday.week_key, "2025-10-05".parse::<WeekKey>().unwrap());
    }

    #[test]
    fn test_dropped_samples_flagged() {
        let mut series = series_1hz(&constant(200.0, 5));
        series.dropped_samples = 3;
        let metrics = compute(&series);
        assert!(metrics.quality_flags.contains(&QualityFlag::DroppedSamples));
    }
}
