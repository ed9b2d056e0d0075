//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// fwflow - firewall connection-log flow aggregator
///
/// Reads every log file under the input directory, aggregates packet and
/// byte counters per (firewall, source, destination, port, protocol) flow,
/// and writes one JSON report.
///
/// Examples:
///   fwflow
///   fwflow --input /var/log/firewall --output-dir ./reports
///   fwflow --input ./syslog --extensions log,csv --exclude archive
///   fwflow --dry-run
///   fwflow --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory to read log files from (recursively)
    ///
    /// Defaults to ./syslog or the value in .fwflow.toml.
    #[arg(short, long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Directory to write the report into
    ///
    /// Created if it does not exist. Defaults to ./output.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report file name prefix
    ///
    /// The run's start time is appended, e.g. FDB_DP_v11_20240101_120000.json
    #[arg(long, value_name = "NAME")]
    pub prefix: Option<String>,

    /// File extensions to include (comma-separated)
    ///
    /// Example: --extensions log,csv
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// File or directory names to skip (comma-separated)
    ///
    /// Example: --exclude archive,rotated
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Write compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,

    /// Number of top flows (by bytes) to print in the summary
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .fwflow.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list the files that would be read and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .fwflow.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.top == Some(0) {
            return Err("--top must be at least 1".to_string());
        }

        if let Some(ref prefix) = self.prefix {
            if prefix.is_empty() || prefix.contains(['/', '\\']) {
                return Err(format!("Invalid report prefix: {:?}", prefix));
            }
        }

        // Validate input directory if provided
        if let Some(ref input) = self.input {
            if input.exists() && !input.is_dir() {
                return Err(format!("Input path is not a directory: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
