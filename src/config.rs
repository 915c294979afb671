//! Run configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! command-line overrides. Invalid settings are fatal and surface as
//! [`ComputeError::Configuration`] before any ride is processed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ComputeError;
use crate::week::WeekRule;

/// Default width of the NP rolling window in seconds
pub const DEFAULT_ROLLING_WINDOW_SECONDS: u32 = 30;

/// Default cap on the time step integrated for kJ
pub const DEFAULT_MAX_GAP_SECONDS_FOR_KJ: f64 = 5.0;

/// Highest supported number of output decimals
pub const MAX_ROUNDING_PRECISION: u8 = 6;

/// Metrics engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Week grouping rule
    pub week_rule: WeekRule,
    /// NP rolling window width (seconds)
    pub rolling_window_seconds: u32,
    /// Largest time step credited per sample when integrating kJ (seconds)
    pub max_gap_seconds_for_kj: f64,
    /// Decimals kept in emitted averages and kJ
    pub rounding_precision: u8,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            week_rule: WeekRule::Iso,
            rolling_window_seconds: DEFAULT_ROLLING_WINDOW_SECONDS,
            max_gap_seconds_for_kj: DEFAULT_MAX_GAP_SECONDS_FOR_KJ,
            rounding_precision: 0,
        }
    }
}

impl MetricsConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ComputeError> {
        let config: MetricsConfig = toml::from_str(content)
            .map_err(|e| ComputeError::Configuration(format!("invalid config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ComputeError::Configuration(format!(
                "cannot read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, ComputeError> {
        toml::to_string_pretty(self)
            .map_err(|e| ComputeError::Configuration(format!("cannot serialize config: {e}")))
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.rolling_window_seconds == 0 {
            return Err(ComputeError::Configuration(
                "rolling_window_seconds must be at least 1".to_string(),
            ));
        }
        if !self.max_gap_seconds_for_kj.is_finite() || self.max_gap_seconds_for_kj <= 0.0 {
            return Err(ComputeError::Configuration(format!(
                "max_gap_seconds_for_kj must be a positive number, got {}",
                self.max_gap_seconds_for_kj
            )));
        }
        if self.rounding_precision > MAX_ROUNDING_PRECISION {
            return Err(ComputeError::Configuration(format!(
                "rounding_precision must be at most {MAX_ROUNDING_PRECISION}, got {}",
                self.rounding_precision
            )));
        }
        Ok(())
    }
}

/// Check that `path` can receive the summary output.
///
/// `-` means stdout and is always accepted. Otherwise the path must not be a
/// directory, and its closest existing ancestor must be a directory.
pub fn check_output_path(path: &Path) -> Result<(), ComputeError> {
    if path.as_os_str() == "-" {
        return Ok(());
    }
    if path.is_dir() {
        return Err(ComputeError::Configuration(format!(
            "output path '{}' is a directory",
            path.display()
        )));
    }

    let mut ancestor = path.parent();
    while let Some(dir) = ancestor {
        if dir.as_os_str().is_empty() {
            break;
        }
        if dir.exists() {
            if !dir.is_dir() {
                return Err(ComputeError::Configuration(format!(
                    "output path '{}' is not writable: '{}' is not a directory",
                    path.display(),
                    dir.display()
                )));
            }
            break;
        }
        ancestor = dir.parent();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = MetricsConfig::default();
        assert_eq!(config.week_rule, WeekRule::Iso);
        assert_eq!(config.rolling_window_seconds, 30);
        assert_eq!(config.max_gap_seconds_for_kj, 5.0);
        assert_eq!(config.rounding_precision, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MetricsConfig::from_toml_str("week_rule = \"sunday\"\n").unwrap();
        assert_eq!(
            config,
            MetricsConfig {
                week_rule: WeekRule::Sunday,
                ..MetricsConfig::default()
            }
        );
    }

    #[test]
    fn test_unknown_week_rule_is_configuration_error() {
        let err = MetricsConfig::from_toml_str("week_rule = \"monday\"\n").unwrap_err();
        assert!(matches!(err, ComputeError::Configuration(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_window = MetricsConfig {
            rolling_window_seconds: 0,
            ..MetricsConfig::default()
        };
        assert!(zero_window.validate().is_err());

        let bad_gap = MetricsConfig {
            max_gap_seconds_for_kj: -1.0,
            ..MetricsConfig::default()
        };
        assert!(bad_gap.validate().is_err());

        let too_precise = MetricsConfig {
            rounding_precision: 9,
            ..MetricsConfig::default()
        };
        assert!(too_precise.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = MetricsConfig {
            week_rule: WeekRule::Sunday,
            rolling_window_seconds: 20,
            max_gap_seconds_for_kj: 3.0,
            rounding_precision: 1,
        };
        let text = config.to_toml().unwrap();
        assert_eq!(MetricsConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_output_path_checks() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_output_path(Path::new("-")).is_ok());
        assert!(check_output_path(dir.path()).is_err());
        assert!(check_output_path(&dir.path().join("out/weekly.csv")).is_ok());

        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        assert!(check_output_path(&file.join("weekly.csv")).is_err());
    }
}
