//! powerweek - Weekly cycling power summaries
//!
//! powerweek turns decoded ride samples into per-week power summaries through
//! a deterministic pipeline: ride file adaptation → series normalization →
//! ride metrics (average power, Normalized Power, non-coasting average, kJ)
//! → week assignment → weekly aggregation → summary encoding.
//!
//! ## Modules
//!
//! - **Ride pipeline**: [`pipeline`] runs rides through [`normalizer`] and
//!   [`metrics`] on a worker pool and folds the results in [`aggregator`]
//! - **Output**: [`encoder`] renders weekly rows as CSV, JSON or a table

pub mod aggregator;
pub mod config;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod types;
pub mod week;

pub use aggregator::WeeklyAggregator;
pub use config::MetricsConfig;
pub use encoder::{SummaryEncoder, SummaryFormat};
pub use error::ComputeError;
pub use pipeline::{analyze_ride, summarize_directory, summarize_rides, WeeklyProcessor};
pub use week::{resolve_week, WeekKey, WeekRule};

// Schema exports
pub use schema::{RawSample, RideFileAdapter, RideInput, SampleTimestamp};

/// Engine version embedded in every report
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "powerweek";
