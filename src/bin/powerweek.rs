//! powerweek CLI - Weekly cycling power summaries from decoded ride files
//!
//! Commands:
//! - summarize: Aggregate a ride directory into weekly rows
//! - rides: List per-ride metrics
//! - validate: Report which ride files would be skipped and why
//! - config: Print the effective configuration

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use powerweek::config::check_output_path;
use powerweek::types::WeeklyReport;
use powerweek::{
    summarize_directory, ComputeError, MetricsConfig, SummaryEncoder, SummaryFormat, WeekRule,
    ENGINE_VERSION,
};

/// powerweek - Weekly cycling power summaries
#[derive(Parser)]
#[command(name = "powerweek")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Summarize ride power data by week", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate every ride in a directory into weekly rows
    Summarize {
        /// Directory of decoded ride files
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "output/weekly_summary.csv")]
        output: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "auto")]
        format: ReportFormat,

        #[command(flatten)]
        settings: ConfigArgs,
    },

    /// List per-ride metrics
    Rides {
        /// Directory of decoded ride files
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        settings: ConfigArgs,
    },

    /// Report which ride files would be skipped and why
    Validate {
        /// Directory of decoded ride files
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        settings: ConfigArgs,
    },

    /// Print the effective configuration as TOML
    Config {
        #[command(flatten)]
        settings: ConfigArgs,
    },
}

/// Settings shared by every command; flags override the config file
#[derive(Args, Clone, Default)]
struct ConfigArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Week grouping rule (iso or sunday)
    #[arg(long)]
    week_rule: Option<String>,

    /// NP rolling window in seconds
    #[arg(long)]
    rolling_window: Option<u32>,

    /// Largest time step credited per sample for kJ, in seconds
    #[arg(long)]
    max_gap: Option<f64>,

    /// Decimals in emitted values
    #[arg(long)]
    precision: Option<u8>,
}

impl ConfigArgs {
    /// Defaults, then the config file, then flags
    fn resolve(&self) -> Result<MetricsConfig, ComputeError> {
        let mut config = match &self.config {
            Some(path) => MetricsConfig::load(path)?,
            None => MetricsConfig::default(),
        };
        if let Some(rule) = &self.week_rule {
            config.week_rule = rule.parse::<WeekRule>()?;
        }
        if let Some(window) = self.rolling_window {
            config.rolling_window_seconds = window;
        }
        if let Some(max_gap) = self.max_gap {
            config.max_gap_seconds_for_kj = max_gap;
        }
        if let Some(precision) = self.precision {
            config.rounding_precision = precision;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    /// Table on an interactive terminal, CSV otherwise
    Auto,
    /// Weekly CSV rows
    Csv,
    /// Full report as pretty JSON
    Json,
    /// Aligned text table with skipped rides and warnings
    Table,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PowerweekCliError> {
    match cli.command {
        Commands::Summarize {
            data_dir,
            output,
            format,
            settings,
        } => cmd_summarize(&data_dir, &output, format, &settings),
        Commands::Rides {
            data_dir,
            json,
            settings,
        } => cmd_rides(&data_dir, json, &settings),
        Commands::Validate {
            data_dir,
            json,
            settings,
        } => cmd_validate(&data_dir, json, &settings),
        Commands::Config { settings } => cmd_config(&settings),
    }
}

fn cmd_summarize(
    data_dir: &Path,
    output: &Path,
    format: ReportFormat,
    settings: &ConfigArgs,
) -> Result<(), PowerweekCliError> {
    let config = settings.resolve()?;
    check_output_path(output)?;

    let report = summarize_directory(data_dir, &config)?;
    let encoder = SummaryEncoder::new(config.rounding_precision);

    let to_stdout = output.as_os_str() == "-";
    let format = match format {
        ReportFormat::Auto if to_stdout && atty::is(atty::Stream::Stdout) => SummaryFormat::Table,
        ReportFormat::Auto | ReportFormat::Csv => SummaryFormat::Csv,
        ReportFormat::Json => SummaryFormat::Json,
        ReportFormat::Table => SummaryFormat::Table,
    };

    // The output file is replaced even when no week was produced
    if !to_stdout {
        encoder.write_report(&report, format, output)?;
    }

    if report.weeks.is_empty() {
        eprint!("{}", encoder.disclosure(&report));
        println!("No ride files found or no usable data.");
        return Ok(());
    }

    if to_stdout {
        print!("{}", encoder.render(&report, format)?);
    } else {
        println!("Wrote weekly summary to {}", output.display());
    }

    // The table already carries the disclosure
    if !(to_stdout && format == SummaryFormat::Table) {
        eprint!("{}", encoder.disclosure(&report));
    }
    Ok(())
}

fn cmd_rides(data_dir: &Path, json: bool, settings: &ConfigArgs) -> Result<(), PowerweekCliError> {
    let config = settings.resolve()?;
    let report = summarize_directory(data_dir, &config)?;
    let encoder = SummaryEncoder::new(config.rounding_precision);

    if json {
        println!("{}", encoder.rides_to_json(&report.rides)?);
    } else {
        print!("{}", encoder.rides_to_table(&report.rides));
        eprint!("{}", encoder.disclosure(&report));
    }
    Ok(())
}

fn cmd_validate(
    data_dir: &Path,
    json: bool,
    settings: &ConfigArgs,
) -> Result<(), PowerweekCliError> {
    let config = settings.resolve()?;
    let report = summarize_directory(data_dir, &config)?;
    let validation = ValidationReport::from(&report);

    if json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total rides:   {}", validation.total_rides);
        println!("Usable rides:  {}", validation.usable_rides);
        println!("Skipped rides: {}", validation.skipped_rides);

        if !report.skipped.is_empty() {
            println!("\nSkipped:");
            for skipped in &report.skipped {
                println!("  - {} [{}]: {}", skipped.ride_id, skipped.reason, skipped.message);
            }
        }
        if !report.warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &report.warnings {
                println!("  - {}: {}", warning.ride_id, warning.flag);
            }
        }
    }

    if validation.skipped_rides > 0 {
        Err(PowerweekCliError::ValidationFailed(validation.skipped_rides))
    } else {
        Ok(())
    }
}

fn cmd_config(settings: &ConfigArgs) -> Result<(), PowerweekCliError> {
    let config = settings.resolve()?;
    print!("{}", config.to_toml()?);
    Ok(())
}

// Error types

#[derive(Debug)]
enum PowerweekCliError {
    Io(std::io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    ValidationFailed(usize),
}

impl From<std::io::Error> for PowerweekCliError {
    fn from(e: std::io::Error) -> Self {
        PowerweekCliError::Io(e)
    }
}

impl From<ComputeError> for PowerweekCliError {
    fn from(e: ComputeError) -> Self {
        PowerweekCliError::Compute(e)
    }
}

impl From<serde_json::Error> for PowerweekCliError {
    fn from(e: serde_json::Error) -> Self {
        PowerweekCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PowerweekCliError> for CliError {
    fn from(e: PowerweekCliError) -> Self {
        match e {
            PowerweekCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PowerweekCliError::Compute(e @ ComputeError::Configuration(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'powerweek config' to inspect the effective settings".to_string()),
            },
            PowerweekCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the ride directory and output path".to_string()),
            },
            PowerweekCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PowerweekCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} ride(s) would be skipped", count),
                hint: Some("Fix or remove the listed ride files and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_rides: usize,
    usable_rides: usize,
    skipped_rides: usize,
    skipped: Vec<ValidationDetail>,
    warnings: Vec<ValidationDetail>,
}

#[derive(serde::Serialize)]
struct ValidationDetail {
    ride_id: String,
    code: String,
    message: Option<String>,
}

impl From<&WeeklyReport> for ValidationReport {
    fn from(report: &WeeklyReport) -> Self {
        Self {
            total_rides: report.total_rides(),
            usable_rides: report.rides.len(),
            skipped_rides: report.skipped.len(),
            skipped: report
                .skipped
                .iter()
                .map(|s| ValidationDetail {
                    ride_id: s.ride_id.clone(),
                    code: s.reason.to_string(),
                    message: Some(s.message.clone()),
                })
                .collect(),
            warnings: report
                .warnings
                .iter()
                .map(|w| ValidationDetail {
                    ride_id: w.ride_id.clone(),
                    code: w.flag.to_string(),
                    message: None,
                })
                .collect(),
        }
    }
}
