//! fwflow - Firewall connection-log flow aggregator
//!
//! A CLI tool that walks a directory of comma-delimited firewall logs,
//! sums packet and byte counters per flow, and writes a JSON report with
//! run metadata.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing input, unreadable file, write failure, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod scanner;

use analysis::FlowAggregator;
use anyhow::{Context, Result};
use cli::Args;
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use report::RunClock;
use scanner::{LogLines, LogScanner, ScanConfig};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("fwflow v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .fwflow.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  .fwflow.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .fwflow.toml")?;

    println!("✅ Created .fwflow.toml with default settings.");
    println!("   Edit it to change the input/output directories and report prefix.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run discovery, aggregation and report writing.
fn run(args: Args) -> Result<()> {
    let clock = RunClock::start();
    info!("Run started at {}", clock.started_at().to_rfc3339());

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let scanner = LogScanner::new(config.input.dir.clone(), ScanConfig::from(&config.input));

    // Handle --dry-run: list files and exit
    if args.dry_run {
        return handle_dry_run(&scanner);
    }

    // Step 1: Discover log files
    println!("📥 Scanning log directory: {}", config.input.dir.display());
    let files = scanner.scan()?;
    info!("Found {} log files", files.len());
    if files.is_empty() {
        warn!("No log files found under {}", config.input.dir.display());
    }

    // Step 2: Aggregate every line of every file
    println!("🔬 Aggregating flows...");
    let progress = if args.quiet {
        None
    } else {
        Some(file_progress_bar(files.len() as u64))
    };

    let mut aggregator = FlowAggregator::new();
    let mut files_processed = Vec::with_capacity(files.len());

    for file in &files {
        files_processed.push(file.display_path());

        let mut lines = LogLines::open(&file.path)?;
        let (file_flows, file_counters) = analysis::aggregate(&mut lines);
        let read = lines.finish()?;
        debug!(
            "{}: {} lines, {} accepted, {} flows",
            file.path.display(),
            read,
            file_counters.accepted(),
            file_flows.len()
        );
        aggregator.merge(file_flows, file_counters);

        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish();
    }

    let counters = aggregator.counters();
    info!(
        "{} flows from {} connections: {} session close, {} accepted, {} short, {} incomplete, {} malformed",
        aggregator.flows().len(),
        counters.connections,
        counters.session_close,
        counters.accepted(),
        counters.short_records,
        counters.incomplete_counters,
        counters.malformed_counters
    );
    let (flows, counters) = aggregator.into_parts();

    // Step 3: Build and write the report
    let timing = clock.stop();
    let report = report::build_report(flows, &counters, &timing, files_processed);

    let output = report::output_path(&config.output.dir, &config.output.prefix, &timing.started_at);
    report::write_json_report(&report, &output, config.output.pretty)?;

    // Print summary
    let top = analysis::top_flows(report.data.values(), config.output.top);
    println!("\n📊 Flow Summary:");
    for line in report::generate_summary_text(&report, &top).lines() {
        println!("   {}", line);
    }
    println!(
        "\n✅ Master record written to {} with {} unique keys.",
        output.display(),
        report.metadata.flows
    );

    Ok(())
}

/// Progress bar over the discovered files.
fn file_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Handle --dry-run: scan files, print what would be read, exit.
fn handle_dry_run(scanner: &LogScanner) -> Result<()> {
    println!("\n🔍 Dry run: scanning files (nothing is aggregated)...\n");

    let files = scanner.scan()?;

    if files.is_empty() {
        println!("   No log files found.");
    } else {
        println!("   Found {} files that would be read:\n", files.len());
        for file in &files {
            println!("     📄 {} ({} bytes)", file.display_path(), file.size);
        }
        println!("\n   Total: {} files", files.len());
    }

    println!("\n✅ Dry run complete. No report was written.");
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .fwflow.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
