//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.fwflow.toml` files. Directories that used to be fixed constants live
//! here and are handed to the run explicitly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".fwflow.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input discovery settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Report output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Where log files are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Root directory walked recursively for log files.
    #[serde(default = "default_input_dir")]
    pub dir: PathBuf,

    /// File extensions to include. Empty reads every file.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// File or directory names to skip.
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: default_input_dir(),
            extensions: Vec::new(),
            excludes: Vec::new(),
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./syslog")
}

/// Where and how the report is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for report files; created if missing.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// File name prefix; the run's start time is appended.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Pretty-print the JSON report.
    #[serde(default = "default_true")]
    pub pretty: bool,

    /// Number of top flows to show in the console summary.
    #[serde(default = "default_top")]
    pub top: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            prefix: default_prefix(),
            pretty: true,
            top: default_top(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_prefix() -> String {
    "FDB_DP_v11".to_string()
}

fn default_true() -> bool {
    true
}

fn default_top() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.fwflow.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.input {
            self.input.dir = dir.clone();
        }
        if let Some(ref extensions) = args.extensions {
            self.input.extensions = extensions.clone();
        }
        if let Some(ref excludes) = args.exclude {
            self.input.excludes = excludes.clone();
        }

        if let Some(ref dir) = args.output_dir {
            self.output.dir = dir.clone();
        }
        if let Some(ref prefix) = args.prefix {
            self.output.prefix = prefix.clone();
        }
        if let Some(top) = args.top {
            self.output.top = top;
        }

        // Flags always override
        if args.compact {
            self.output.pretty = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
