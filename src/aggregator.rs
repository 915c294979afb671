//! Weekly aggregation
//!
//! This module groups per-ride metrics by week and reduces each group to a
//! [`WeeklySummary`]. Weekly averages are unweighted means over rides: a long
//! ride and a short ride count the same.

use crate::types::{RideMetrics, WeeklySummary};
use crate::week::WeekKey;
use std::collections::BTreeMap;

/// Running sums for one week
#[derive(Debug, Clone, Default, PartialEq)]
struct WeekAccumulator {
    ride_count: usize,
    sum_avg_watts: f64,
    sum_np: f64,
    /// Non-coasting sums only cover rides that have a non-coasting average
    sum_noncoasting: f64,
    noncoasting_count: usize,
    total_kj: f64,
}

impl WeekAccumulator {
    fn add(&mut self, metrics: &RideMetrics) {
        self.ride_count += 1;
        self.sum_avg_watts += metrics.avg_watts;
        self.sum_np += metrics.normalized_power;
        if let Some(noncoasting) = metrics.noncoasting_avg_watts {
            self.sum_noncoasting += noncoasting;
            self.noncoasting_count += 1;
        }
        self.total_kj += metrics.total_kj;
    }

    fn merge(&mut self, other: WeekAccumulator) {
        self.ride_count += other.ride_count;
        self.sum_avg_watts += other.sum_avg_watts;
        self.sum_np += other.sum_np;
        self.sum_noncoasting += other.sum_noncoasting;
        self.noncoasting_count += other.noncoasting_count;
        self.total_kj += other.total_kj;
    }

    fn finalize(self, week: WeekKey) -> WeeklySummary {
        let rides = self.ride_count as f64;
        WeeklySummary {
            week,
            avg_watts: self.sum_avg_watts / rides,
            avg_np: self.sum_np / rides,
            avg_noncoasting_watts: (self.noncoasting_count > 0)
                .then(|| self.sum_noncoasting / self.noncoasting_count as f64),
            ride_count: self.ride_count,
            total_kj: self.total_kj,
        }
    }
}

/// Aggregator mapping each week to its running sums
#[derive(Debug, Clone, Default)]
pub struct WeeklyAggregator {
    weeks: BTreeMap<WeekKey, WeekAccumulator>,
}

impl WeeklyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one ride to its week
    pub fn add(&mut self, metrics: &RideMetrics) {
        self.weeks
            .entry(metrics.week_key)
            .or_default()
            .add(metrics);
    }

    /// Fold another aggregator's weeks into this one
    pub fn merge(&mut self, other: WeeklyAggregator) {
        for (week, acc) in other.weeks {
            self.weeks.entry(week).or_default().merge(acc);
        }
    }

    /// Number of rides added so far
    pub fn ride_count(&self) -> usize {
        self.weeks.values().map(|acc| acc.ride_count).sum()
    }

    /// Number of distinct weeks seen so far
    pub fn week_count(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    /// Freeze into weekly summaries, ascending by week
    pub fn finalize(self) -> Vec<WeeklySummary> {
        self.weeks
            .into_iter()
            .filter(|(_, acc)| acc.ride_count > 0)
            .map(|(week, acc)| acc.finalize(week))
            .collect()
    }
}

impl<'a> Extend<&'a RideMetrics> for WeeklyAggregator {
    fn extend<I: IntoIterator<Item = &'a RideMetrics>>(&mut self, iter: I) {
        for metrics in iter {
            self.add(metrics);
        }
    }
}
