//! Summary encoding
//!
//! This module renders weekly reports as CSV, JSON and plain-text tables.
//! Emitted reals are rounded half away from zero to the configured number of
//! decimals; computation upstream always keeps full `f64` precision.

use crate::error::ComputeError;
use crate::types::{RideMetrics, WeeklyReport, WeeklySummary};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Column order of the weekly CSV
pub const CSV_HEADER: [&str; 6] = [
    "week",
    "avg_watts",
    "avg_np",
    "avg_noncoasting_watts",
    "ride_count",
    "total_kj",
];

/// Rendering of a whole weekly report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFormat {
    /// Weekly rows only
    Csv,
    /// Full report, pretty-printed
    Json,
    /// Aligned weekly table with skipped rides and warnings
    Table,
}

/// Encoder for weekly summary output
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryEncoder {
    precision: u8,
}

impl SummaryEncoder {
    /// Create an encoder emitting `precision` decimals
    pub fn new(precision: u8) -> Self {
        Self { precision }
    }

    /// Encode weekly rows as CSV text
    pub fn to_csv(&self, weeks: &[WeeklySummary]) -> Result<String, ComputeError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for week in weeks {
            writer.write_record(self.summary_fields(week))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ComputeError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| ComputeError::ParseError(e.to_string()))
    }

    /// Render a report in the given format
    pub fn render(&self, report: &WeeklyReport, format: SummaryFormat) -> Result<String, ComputeError> {
        match format {
            SummaryFormat::Csv => self.to_csv(&report.weeks),
            SummaryFormat::Json => self.to_json(report),
            SummaryFormat::Table => Ok(self.to_table(report)),
        }
    }

    /// Write a rendered report to `path`, creating parent directories.
    ///
    /// The file is always replaced, so a report without weeks still leaves a
    /// CSV header rather than an earlier run's rows.
    pub fn write_report(
        &self,
        report: &WeeklyReport,
        format: SummaryFormat,
        path: &Path,
    ) -> Result<(), ComputeError> {
        let rendered = self.render(report, format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, rendered)?;
        Ok(())
    }

    /// Encode the whole report as pretty JSON
    pub fn to_json(&self, report: &WeeklyReport) -> Result<String, ComputeError> {
        let mut rounded = report.clone();
        for week in &mut rounded.weeks {
            self.round_summary(week);
        }
        for ride in &mut rounded.rides {
            self.round_ride(ride);
        }
        serde_json::to_string_pretty(&rounded).map_err(ComputeError::JsonError)
    }

    /// Encode per-ride metrics as pretty JSON
    pub fn rides_to_json(&self, rides: &[RideMetrics]) -> Result<String, ComputeError> {
        let rounded: Vec<RideMetrics> = rides
            .iter()
            .cloned()
            .map(|mut ride| {
                self.round_ride(&mut ride);
                ride
            })
            .collect();
        serde_json::to_string_pretty(&rounded).map_err(ComputeError::JsonError)
    }

    /// Render the report as an aligned table followed by skips and warnings
    pub fn to_table(&self, report: &WeeklyReport) -> String {
        let rows: Vec<Vec<String>> = report
            .weeks
            .iter()
            .map(|week| self.summary_fields(week))
            .collect();
        let mut out = render_table(&CSV_HEADER, &rows);
        out.push_str(&self.disclosure(report));
        out
    }

    /// Render per-ride metrics as an aligned table
    pub fn rides_to_table(&self, rides: &[RideMetrics]) -> String {
        let header = [
            "ride_id",
            "start_time",
            "week",
            "avg_watts",
            "np",
            "noncoasting_watts",
            "samples",
            "total_kj",
        ];
        let rows: Vec<Vec<String>> = rides
            .iter()
            .map(|ride| {
                vec![
                    ride.ride_id.clone(),
                    ride.start_time.to_rfc3339(),
                    ride.week_key.to_string(),
                    self.format_value(ride.avg_watts),
                    self.format_value(ride.normalized_power),
                    self.format_optional(ride.noncoasting_avg_watts),
                    ride.sample_count.to_string(),
                    self.format_value(ride.total_kj),
                ]
            })
            .collect();
        render_table(&header, &rows)
    }

    /// Skipped-ride count with per-ride reasons, then warnings.
    ///
    /// Empty when the run had neither.
    pub fn disclosure(&self, report: &WeeklyReport) -> String {
        let mut out = String::new();
        if !report.skipped.is_empty() {
            let _ = writeln!(
                out,
                "\nSkipped {} of {} ride(s):",
                report.skipped.len(),
                report.total_rides()
            );
            for skipped in &report.skipped {
                let _ = writeln!(
                    out,
                    "  {}: {} ({})",
                    skipped.ride_id, skipped.reason, skipped.message
                );
            }
        }
        if !report.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings:");
            for warning in &report.warnings {
                let _ = writeln!(out, "  {}: {}", warning.ride_id, warning.flag);
            }
        }
        out
    }

    fn summary_fields(&self, week: &WeeklySummary) -> Vec<String> {
        vec![
            week.week.to_string(),
            self.format_value(week.avg_watts),
            self.format_value(week.avg_np),
            self.format_optional(week.avg_noncoasting_watts),
            week.ride_count.to_string(),
            self.format_value(week.total_kj),
        ]
    }

    fn round_summary(&self, week: &mut WeeklySummary) {
        week.avg_watts = round_to(week.avg_watts, self.precision);
        week.avg_np = round_to(week.avg_np, self.precision);
        week.avg_noncoasting_watts = week
            .avg_noncoasting_watts
            .map(|v| round_to(v, self.precision));
        week.total_kj = round_to(week.total_kj, self.precision);
    }

    fn round_ride(&self, ride: &mut RideMetrics) {
        ride.avg_watts = round_to(ride.avg_watts, self.precision);
        ride.normalized_power = round_to(ride.normalized_power, self.precision);
        ride.noncoasting_avg_watts = ride
            .noncoasting_avg_watts
            .map(|v| round_to(v, self.precision));
        ride.total_kj = round_to(ride.total_kj, self.precision);
    }

    fn format_value(&self, value: f64) -> String {
        let precision = usize::from(self.precision);
        format!("{:.precision$}", round_to(value, self.precision))
    }

    fn format_optional(&self, value: Option<f64>) -> String {
        value.map(|v| self.format_value(v)).unwrap_or_default()
    }
}

/// Round half away from zero to `precision` decimals
pub fn round_to(value: f64, precision: u8) -> f64 {
    let factor = 10f64.powi(i32::from(precision));
    let rounded = (value * factor).round() / factor;
    // Normalize -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn render_table<S: AsRef<str>>(header: &[S], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.as_ref().len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let header_cells: Vec<&str> = header.iter().map(|h| h.as_ref()).collect();
    push_row(&mut out, &header_cells, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, &rule, &widths);
    for row in rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, width))| {
            // First column left-aligned, numbers right-aligned
            if i == 0 {
                format!("{:<width$}", cell.as_ref())
            } else {
                format!("{:>width$}", cell.as_ref())
            }
        })
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}
