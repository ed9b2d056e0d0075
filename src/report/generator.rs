//! JSON report generation.
//!
//! This module builds the report document from the aggregated flows and
//! run counters, names the output file after the run's start time, and
//! writes it to disk.

use crate::models::{
    FlowKey, FlowRecord, ProcessingPerformance, Report, ReportMetadata, RunCounters,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Wall-clock and monotonic start of a run.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    started_at: DateTime<Local>,
    started: Instant,
}

impl RunClock {
    /// Start timing now.
    pub fn start() -> Self {
        Self {
            started_at: Local::now(),
            started: Instant::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Stop timing. Elapsed time comes from the monotonic clock.
    pub fn stop(&self) -> RunTiming {
        RunTiming {
            started_at: self.started_at,
            finished_at: Local::now(),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Start, end and duration of a finished run.
#[derive(Debug, Clone, Copy)]
pub struct RunTiming {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub elapsed: Duration,
}

/// Seconds since the Unix epoch, with sub-second precision.
pub fn epoch_seconds<Tz: TimeZone>(time: &DateTime<Tz>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9
}

/// Render the session-close share, e.g. `"5 (62.50% of total connections)"`.
///
/// With no connections at all the share is reported as 0.00%.
pub fn session_close_summary(session_close: u64, connections: u64) -> String {
    let pct = if connections == 0 {
        0.0
    } else {
        session_close as f64 / connections as f64 * 100.0
    };
    format!("{} ({:.2}% of total connections)", session_close, pct)
}

/// Render throughput, e.g. `"1250.00 connections/second"`.
///
/// A zero elapsed time reports 0.00 rather than dividing by zero.
pub fn connections_per_second(connections: u64, elapsed_secs: f64) -> String {
    let rate = if elapsed_secs > 0.0 {
        connections as f64 / elapsed_secs
    } else {
        0.0
    };
    format!("{:.2} connections/second", rate)
}

/// Assemble the report document.
pub fn build_report(
    flows: HashMap<FlowKey, FlowRecord>,
    counters: &RunCounters,
    timing: &RunTiming,
    files_processed: Vec<String>,
) -> Report {
    let elapsed = timing.elapsed.as_secs_f64();

    let metadata = ReportMetadata {
        start_time: epoch_seconds(&timing.started_at),
        end_time: epoch_seconds(&timing.finished_at),
        elapsed_time: elapsed,
        total_connections: counters.connections,
        session_close: session_close_summary(counters.session_close, counters.connections),
        flows: flows.len(),
        files_processed,
        processing_performance: ProcessingPerformance {
            connections_per_second: connections_per_second(counters.connections, elapsed),
        },
    };

    Report {
        metadata,
        data: flows.into_iter().collect(),
    }
}

/// Report file path: `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.json`.
pub fn output_path<Tz>(dir: &Path, prefix: &str, started_at: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    dir.join(format!(
        "{}_{}.json",
        prefix,
        started_at.format("%Y%m%d_%H%M%S")
    ))
}

/// Serialize the report.
pub fn generate_json_report(report: &Report, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    };
    json.map_err(Into::into)
}

/// Write a JSON report to `path`, creating its directory if missing.
pub fn write_json_report(report: &Report, path: &Path, pretty: bool) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let content = generate_json_report(report, pretty)?;
    debug!("Writing {} bytes to {}", content.len(), path.display());

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(())
}

/// Generate a plain-text summary for the console.
pub fn generate_summary_text(report: &Report, top: &[&FlowRecord]) -> String {
    let meta = &report.metadata;
    let mut lines = Vec::new();

    lines.push(format!("Files processed: {}", meta.files_processed.len()));
    lines.push(format!("Total connections: {}", meta.total_connections));
    lines.push(format!("Session close: {}", meta.session_close));
    lines.push(format!("Flows: {}", meta.flows));
    lines.push(format!(
        "Elapsed: {:.2}s ({})",
        meta.elapsed_time, meta.processing_performance.connections_per_second
    ));

    if !top.is_empty() {
        lines.push(String::new());
        lines.push("Top flows by bytes:".to_string());

        for record in top {
            lines.push(format!(
                "- {}: {} bytes in / {} bytes out over {} connections",
                record.key, record.bytes_in, record.bytes_out, record.count
            ));
        }
    }

    lines.join("\n")
}
