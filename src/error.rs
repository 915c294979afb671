//! Error types for powerweek

use thiserror::Error;

use crate::types::SkipReason;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid ride: {0}")]
    InvalidRide(String),

    #[error("No power data: {0}")]
    NoPowerData(String),

    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to parse ride data: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComputeError {
    /// Reason code recorded when this error causes a ride to be skipped.
    ///
    /// Returns `None` for configuration errors, which abort the run instead.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            ComputeError::InvalidRide(_) => Some(SkipReason::InvalidRide),
            ComputeError::NoPowerData(_) => Some(SkipReason::NoPowerData),
            ComputeError::InvalidSample(_) => Some(SkipReason::InvalidSample),
            ComputeError::Configuration(_) => None,
            ComputeError::ParseError(_)
            | ComputeError::JsonError(_)
            | ComputeError::CsvError(_)
            | ComputeError::Io(_) => Some(SkipReason::Unreadable),
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, ComputeError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ride_errors_map_to_skip_reasons() {
        assert_eq!(
            ComputeError::InvalidRide("r".to_string()).skip_reason(),
            Some(SkipReason::InvalidRide)
        );
        assert_eq!(
            ComputeError::NoPowerData("r".to_string()).skip_reason(),
            Some(SkipReason::NoPowerData)
        );
        assert_eq!(
            ComputeError::InvalidSample("r".to_string()).skip_reason(),
            Some(SkipReason::InvalidSample)
        );
        assert_eq!(
            ComputeError::ParseError("bad line".to_string()).skip_reason(),
            Some(SkipReason::Unreadable)
        );
    }

    #[test]
    fn test_configuration_error_is_fatal() {
        let err = ComputeError::Configuration("unknown week rule: monday".to_string());
        assert!(err.is_fatal());
        assert_eq!(err.skip_reason(), None);
        assert!(err.to_string().contains("monday"));
    }
}
