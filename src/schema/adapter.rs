//! Adapter for loading decoded ride files
//!
//! Each file in a ride directory holds one ride. The file stem becomes the
//! ride identifier unless a JSON file names the ride itself.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ComputeError;
use crate::schema::sample::{RawSample, RideFile, RideInput, SampleTimestamp};

/// Supported decoded ride file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideFileFormat {
    /// JSON array of samples, or `{ "ride_id", "samples" }`
    Json,
    /// One JSON sample per line
    Ndjson,
    /// `timestamp,power_watts` columns
    Csv,
}

impl RideFileFormat {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(RideFileFormat::Json),
            "ndjson" | "jsonl" => Some(RideFileFormat::Ndjson),
            "csv" => Some(RideFileFormat::Csv),
            _ => None,
        }
    }
}

/// A ride file that could not be decoded
#[derive(Debug)]
pub struct UnreadableRide {
    pub ride_id: String,
    pub path: PathBuf,
    pub error: ComputeError,
}

/// Result of loading a ride directory
#[derive(Debug, Default)]
pub struct LoadedRides {
    /// Successfully decoded rides, in file-name order
    pub rides: Vec<RideInput>,
    /// Files with a recognized extension that failed to decode
    pub unreadable: Vec<UnreadableRide>,
}

/// Row shape of a CSV ride file; unknown columns are ignored
#[derive(Debug, Deserialize)]
struct CsvSampleRow {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, alias = "power")]
    power_watts: Option<f64>,
}

/// Adapter for converting decoded ride files to engine input
pub struct RideFileAdapter;

impl RideFileAdapter {
    /// Parse a JSON ride document
    pub fn parse_json(ride_id: &str, json: &str) -> Result<RideInput, ComputeError> {
        let ride = match serde_json::from_str::<RideFile>(json)? {
            RideFile::Samples(samples) => RideInput::new(ride_id, samples),
            RideFile::Ride {
                ride_id: named,
                samples,
            } => RideInput::new(named.unwrap_or_else(|| ride_id.to_string()), samples),
        };
        Ok(Self::finish(ride))
    }

    /// Parse NDJSON (one sample per line)
    pub fn parse_ndjson(ride_id: &str, ndjson: &str) -> Result<RideInput, ComputeError> {
        let mut samples = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawSample>(trimmed) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(Self::finish(RideInput::new(ride_id, samples)))
    }

    /// Parse CSV with a header row naming `timestamp` and `power_watts`
    pub fn parse_csv(ride_id: &str, data: &str) -> Result<RideInput, ComputeError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(data.as_bytes());

        let headers = reader.headers()?.clone();
        if !headers.iter().any(|h| h == "timestamp") {
            return Err(ComputeError::ParseError(
                "CSV header has no 'timestamp' column".to_string(),
            ));
        }
        if !headers.iter().any(|h| h == "power_watts" || h == "power") {
            return Err(ComputeError::ParseError(
                "CSV header has no 'power_watts' column".to_string(),
            ));
        }

        let mut samples = Vec::new();
        for row in reader.deserialize::<CsvSampleRow>() {
            let row = row?;
            samples.push(RawSample {
                timestamp: row
                    .timestamp
                    .filter(|t| !t.is_empty())
                    .map(SampleTimestamp::Text),
                power_watts: row.power_watts,
            });
        }
        Ok(Self::finish(RideInput::new(ride_id, samples)))
    }

    /// Load one ride file, dispatching on its extension
    pub fn load_file(path: &Path) -> Result<RideInput, ComputeError> {
        let format = RideFileFormat::from_path(path).ok_or_else(|| {
            ComputeError::ParseError(format!("unsupported ride file: {}", path.display()))
        })?;
        let ride_id = ride_id_from_path(path);
        let content = fs::read_to_string(path)?;

        match format {
            RideFileFormat::Json => Self::parse_json(&ride_id, &content),
            RideFileFormat::Ndjson => Self::parse_ndjson(&ride_id, &content),
            RideFileFormat::Csv => Self::parse_csv(&ride_id, &content),
        }
    }

    /// Load every recognized ride file in `dir`, sorted by file name.
    ///
    /// A missing directory yields no rides. Files that fail to decode are
    /// returned in [`LoadedRides::unreadable`] rather than aborting the load.
    pub fn load_directory(dir: &Path) -> Result<LoadedRides, ComputeError> {
        let mut loaded = LoadedRides::default();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "ride directory does not exist");
            return Ok(loaded);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && RideFileFormat::from_path(p).is_some())
            .collect();
        paths.sort();

        for path in paths {
            match Self::load_file(&path) {
                Ok(ride) => {
                    debug!(ride_id = %ride.ride_id, samples = ride.samples.len(), "loaded ride file");
                    loaded.rides.push(ride);
                }
                Err(error) => loaded.unreadable.push(UnreadableRide {
                    ride_id: ride_id_from_path(&path),
                    path,
                    error,
                }),
            }
        }

        Ok(loaded)
    }

    fn finish(mut ride: RideInput) -> RideInput {
        ride.sort_by_timestamp();
        ride
    }
}

fn ride_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
