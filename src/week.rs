//! Week assignment
//!
//! Maps a ride's start timestamp to the calendar week it belongs to. Two rules
//! are supported:
//! - `iso`: ISO-8601 week-year and week number (`2025-W01`)
//! - `sunday`: the Sunday on or before the ride's date (`2025-01-05`)
//!
//! No timezone conversion happens here; the local date under the timestamp's
//! own offset decides the week.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ComputeError;

/// Rule used to group rides into weeks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekRule {
    /// ISO-8601 weeks (Monday start, week-year aware)
    #[default]
    Iso,
    /// Sunday-anchored weeks keyed by the Sunday's date
    Sunday,
}

impl WeekRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekRule::Iso => "iso",
            WeekRule::Sunday => "sunday",
        }
    }
}

impl fmt::Display for WeekRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeekRule {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iso" => Ok(WeekRule::Iso),
            "sunday" => Ok(WeekRule::Sunday),
            other => Err(ComputeError::Configuration(format!(
                "unknown week rule '{other}' (expected 'iso' or 'sunday')"
            ))),
        }
    }
}

/// Identifier of a calendar week
///
/// Ordering is chronological within a rule. A single run only ever produces
/// keys of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WeekKey {
    /// ISO week-year and week number (1-53)
    Iso { year: i32, week: u32 },
    /// Date of the Sunday that starts the week
    Sunday(NaiveDate),
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekKey::Iso { year, week } => write!(f, "{year}-W{week:02}"),
            WeekKey::Sunday(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl FromStr for WeekKey {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((year, week)) = s.split_once("-W") {
            let year: i32 = year
                .parse()
                .map_err(|_| ComputeError::ParseError(format!("invalid week key: {s}")))?;
            let week: u32 = week
                .parse()
                .map_err(|_| ComputeError::ParseError(format!("invalid week key: {s}")))?;
            if NaiveDate::from_isoywd_opt(year, week, chrono::Weekday::Mon).is_none() {
                return Err(ComputeError::ParseError(format!("invalid week key: {s}")));
            }
            return Ok(WeekKey::Iso { year, week });
        }

        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ComputeError::ParseError(format!("invalid week key: {s}")))?;
        Ok(WeekKey::Sunday(sunday_on_or_before(date)))
    }
}

impl Serialize for WeekKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Resolve the week a ride starting at `start` belongs to under `rule`
pub fn resolve_week(start: DateTime<FixedOffset>, rule: WeekRule) -> WeekKey {
    let date = start.date_naive();
    match rule {
        WeekRule::Iso => {
            let iso = date.iso_week();
            WeekKey::Iso {
                year: iso.year(),
                week: iso.week(),
            }
        }
        WeekRule::Sunday => WeekKey::Sunday(sunday_on_or_before(date)),
    }
}

fn sunday_on_or_before(date: NaiveDate) -> NaiveDate {
    let days_since_sunday = date.weekday().num_days_from_sunday();
    date - Duration::days(i64::from(days_since_sunday))
}
