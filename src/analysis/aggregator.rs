//! Flow aggregation.
//!
//! Reduces a stream of connection-log lines into one record per flow key,
//! keeping run counters on the side. Lines are never fatal: each one either
//! merges into a flow or is tallied under a rejection reason.

use crate::error::LineError;
use crate::models::{FlowKey, FlowRecord, ParsedConnection, RawConnection, RunCounters};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::trace;

/// Accumulates flow records and run counters over a sequence of lines.
#[derive(Debug, Default)]
pub struct FlowAggregator {
    flows: HashMap<FlowKey, FlowRecord>,
    counters: RunCounters,
}

impl FlowAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw line.
    ///
    /// Every call counts as a connection. A line that passes the
    /// non-empty-counters check counts as a session close even if its
    /// counters then fail to parse.
    pub fn ingest_line(&mut self, line: &str) -> Result<(), LineError> {
        self.counters.connections += 1;

        let result = self.process(line);
        if let Err(ref e) = result {
            self.counters.reject(e);
        }
        result
    }

    fn process(&mut self, line: &str) -> Result<(), LineError> {
        let raw = RawConnection::split(line)?;
        raw.require_counters()?;

        self.counters.session_close += 1;

        let conn = raw.parse_counters()?;
        self.record(&conn);
        Ok(())
    }

    fn record(&mut self, conn: &ParsedConnection<'_>) {
        match self.flows.entry(conn.flow_key()) {
            Entry::Occupied(mut entry) => entry.get_mut().add(conn),
            Entry::Vacant(entry) => {
                let record = FlowRecord::from_connection(entry.key().clone(), conn);
                entry.insert(record);
            }
        }
    }

    /// Feed a sequence of lines, skipping the ones that don't parse.
    pub fn ingest<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            if let Err(e) = self.ingest_line(line.as_ref()) {
                trace!("Skipping line: {}", e);
            }
        }
    }

    /// Fold another batch's flows and counters (as returned by
    /// [`aggregate`]) into this one.
    pub fn merge(&mut self, flows: HashMap<FlowKey, FlowRecord>, counters: RunCounters) {
        self.counters.absorb(&counters);

        for (key, record) in flows {
            match self.flows.entry(key) {
                Entry::Occupied(mut entry) => entry.get_mut().absorb(&record),
                Entry::Vacant(entry) => {
                    entry.insert(record);
                }
            }
        }
    }

    pub fn flows(&self) -> &HashMap<FlowKey, FlowRecord> {
        &self.flows
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    /// Consume the aggregator, returning the flow map and counters.
    pub fn into_parts(self) -> (HashMap<FlowKey, FlowRecord>, RunCounters) {
        (self.flows, self.counters)
    }
}

/// Aggregate a complete sequence of lines in one call.
pub fn aggregate<I, S>(lines: I) -> (HashMap<FlowKey, FlowRecord>, RunCounters)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut aggregator = FlowAggregator::new();
    aggregator.ingest(lines);
    aggregator.into_parts()
}

/// The `n` flows with the most bytes in both directions.
///
/// Ties break on key so the ordering is stable.
pub fn top_flows<'a, I>(records: I, n: usize) -> Vec<&'a FlowRecord>
where
    I: IntoIterator<Item = &'a FlowRecord>,
{
    let mut records: Vec<&FlowRecord> = records.into_iter().collect();
    records.sort_by(|a, b| {
        b.total_bytes()
            .cmp(&a.total_bytes())
            .then_with(|| a.key.cmp(&b.key))
    });
    records.truncate(n);
    records
}
