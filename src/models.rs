//! Data models for the flow aggregator.
//!
//! This module contains the per-line connection types, the aggregated
//! flow records, the run counters, and the report document written at the
//! end of a run.

use crate::error::LineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Delimiter between fields of a log line.
pub const FIELD_DELIMITER: char = ',';

/// Separator between the components of a flow key.
pub const KEY_SEPARATOR: &str = "_";

/// Number of positional fields a log line must carry.
pub const REQUIRED_FIELDS: usize = 13;

/// Counter names in positional order, as they appear in the report.
const COUNTER_FIELDS: [&str; 4] = ["packets-in", "bytes-in", "packets-out", "bytes-out"];

/// A log line split into its first 13 positional fields.
///
/// Counter fields are still raw strings here; nothing has been parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConnection<'a> {
    pub timestamp: &'a str,
    pub firewall_ip: &'a str,
    pub source_ip: &'a str,
    pub destination_ip: &'a str,
    pub destination_port: &'a str,
    pub protocol_id: &'a str,
    /// packets-in, bytes-in, packets-out, bytes-out.
    pub counters: [&'a str; 4],
}

impl<'a> RawConnection<'a> {
    /// Split a line into positional fields.
    ///
    /// Surrounding whitespace is trimmed first. Fields past the 13th are
    /// ignored, as are the action and both NAT columns.
    pub fn split(line: &'a str) -> Result<Self, LineError> {
        let fields: Vec<&str> = line.trim().split(FIELD_DELIMITER).collect();

        if fields.len() < REQUIRED_FIELDS {
            return Err(LineError::ShortRecord {
                fields: fields.len(),
                required: REQUIRED_FIELDS,
            });
        }

        Ok(Self {
            timestamp: fields[0],
            firewall_ip: fields[1],
            source_ip: fields[3],
            destination_ip: fields[4],
            destination_port: fields[5],
            protocol_id: fields[6],
            counters: [fields[9], fields[10], fields[11], fields[12]],
        })
    }

    /// Check that all four counter fields are non-empty.
    pub fn require_counters(&self) -> Result<(), LineError> {
        match self.counters.iter().position(|c| c.is_empty()) {
            Some(idx) => Err(LineError::IncompleteCounters {
                field: COUNTER_FIELDS[idx],
            }),
            None => Ok(()),
        }
    }

    /// Parse the counter fields as integers.
    pub fn parse_counters(&self) -> Result<ParsedConnection<'a>, LineError> {
        let mut values = [0i64; 4];

        for (idx, raw) in self.counters.iter().enumerate() {
            values[idx] = parse_counter(raw).ok_or_else(|| LineError::MalformedCounter {
                field: COUNTER_FIELDS[idx],
                value: raw.to_string(),
            })?;
        }

        let [packets_in, bytes_in, packets_out, bytes_out] = values;

        Ok(ParsedConnection {
            timestamp: self.timestamp,
            firewall_ip: self.firewall_ip,
            source_ip: self.source_ip,
            destination_ip: self.destination_ip,
            destination_port: self.destination_port,
            protocol_id: self.protocol_id,
            packets_in,
            bytes_in,
            packets_out,
            bytes_out,
        })
    }
}

/// Parse one counter value.
///
/// Surrounding whitespace is ignored and a single `_` may separate digits
/// (`1_000`). Leading, trailing or doubled underscores are malformed.
fn parse_counter(raw: &str) -> Option<i64> {
    let value = raw.trim();
    if !value.contains('_') {
        return value.parse().ok();
    }

    let digits = value.strip_prefix(['+', '-']).unwrap_or(value).as_bytes();
    let grouped = digits.iter().enumerate().all(|(i, &b)| {
        b != b'_'
            || (i > 0
                && i + 1 < digits.len()
                && digits[i - 1].is_ascii_digit()
                && digits[i + 1].is_ascii_digit())
    });
    if !grouped {
        return None;
    }

    value.replace('_', "").parse().ok()
}

/// A fully parsed connection line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConnection<'a> {
    /// Only checked for presence by the field count.
    #[allow(dead_code)]
    pub timestamp: &'a str,
    pub firewall_ip: &'a str,
    pub source_ip: &'a str,
    pub destination_ip: &'a str,
    /// Kept as text; only ever a key component.
    pub destination_port: &'a str,
    pub protocol_id: &'a str,
    pub packets_in: i64,
    pub bytes_in: i64,
    pub packets_out: i64,
    pub bytes_out: i64,
}

impl ParsedConnection<'_> {
    /// Derive the flow key for this connection.
    pub fn flow_key(&self) -> FlowKey {
        FlowKey::new(
            self.firewall_ip,
            self.source_ip,
            self.destination_ip,
            self.destination_port,
            self.protocol_id,
        )
    }
}

/// Identity of an aggregated flow.
///
/// Firewall, source, destination, destination port and protocol joined by
/// `_`. Comparison is textual and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowKey(String);

impl FlowKey {
    pub fn new(
        firewall_ip: &str,
        source_ip: &str,
        destination_ip: &str,
        destination_port: &str,
        protocol_id: &str,
    ) -> Self {
        Self(
            [
                firewall_ip,
                source_ip,
                destination_ip,
                destination_port,
                protocol_id,
            ]
            .join(KEY_SEPARATOR),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulated traffic for one flow key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlowRecord {
    /// Repeated here so each record describes itself in the report.
    pub key: FlowKey,
    pub source_ip: String,
    pub destination_ip: String,
    pub packets_in: i64,
    pub bytes_in: i64,
    pub packets_out: i64,
    pub bytes_out: i64,
    /// Number of lines merged into this record.
    pub count: u64,
}

impl FlowRecord {
    /// Start a record from its first observed connection.
    pub fn from_connection(key: FlowKey, conn: &ParsedConnection<'_>) -> Self {
        Self {
            key,
            source_ip: conn.source_ip.to_string(),
            destination_ip: conn.destination_ip.to_string(),
            packets_in: conn.packets_in,
            bytes_in: conn.bytes_in,
            packets_out: conn.packets_out,
            bytes_out: conn.bytes_out,
            count: 1,
        }
    }

    /// Add one more connection with the same key.
    pub fn add(&mut self, conn: &ParsedConnection<'_>) {
        self.packets_in = self.packets_in.saturating_add(conn.packets_in);
        self.bytes_in = self.bytes_in.saturating_add(conn.bytes_in);
        self.packets_out = self.packets_out.saturating_add(conn.packets_out);
        self.bytes_out = self.bytes_out.saturating_add(conn.bytes_out);
        self.count += 1;
    }

    /// Fold another record for the same key into this one.
    pub fn absorb(&mut self, other: &FlowRecord) {
        debug_assert_eq!(self.key, other.key);
        self.packets_in = self.packets_in.saturating_add(other.packets_in);
        self.bytes_in = self.bytes_in.saturating_add(other.bytes_in);
        self.packets_out = self.packets_out.saturating_add(other.packets_out);
        self.bytes_out = self.bytes_out.saturating_add(other.bytes_out);
        self.count += other.count;
    }

    /// Bytes in both directions.
    pub fn total_bytes(&self) -> i64 {
        self.bytes_in.saturating_add(self.bytes_out)
    }
}

/// Counters accumulated across a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Every line observed, including blank and malformed ones.
    pub connections: u64,
    /// Lines whose four counters were all non-empty, parseable or not.
    pub session_close: u64,
    pub short_records: u64,
    pub incomplete_counters: u64,
    pub malformed_counters: u64,
}

impl RunCounters {
    /// Lines that made it into a flow record.
    pub fn accepted(&self) -> u64 {
        self.session_close.saturating_sub(self.malformed_counters)
    }

    /// Record a rejected line against its reason.
    pub fn reject(&mut self, err: &LineError) {
        match err {
            LineError::ShortRecord { .. } => self.short_records += 1,
            LineError::IncompleteCounters { .. } => self.incomplete_counters += 1,
            LineError::MalformedCounter { .. } => self.malformed_counters += 1,
        }
    }

    /// Add another run's counters to these.
    pub fn absorb(&mut self, other: &RunCounters) {
        self.connections += other.connections;
        self.session_close += other.session_close;
        self.short_records += other.short_records;
        self.incomplete_counters += other.incomplete_counters;
        self.malformed_counters += other.malformed_counters;
    }
}

/// Throughput figures for the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingPerformance {
    pub connections_per_second: String,
}

/// Metadata block of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// Seconds since the Unix epoch.
    pub start_time: f64,
    /// Seconds since the Unix epoch.
    pub end_time: f64,
    pub elapsed_time: f64,
    pub total_connections: u64,
    /// `"<n> (<pct>% of total connections)"`.
    pub session_close: String,
    pub flows: usize,
    pub files_processed: Vec<String>,
    pub processing_performance: ProcessingPerformance,
}

/// The complete report document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    /// Sorted by key so repeated runs diff cleanly.
    pub data: BTreeMap<FlowKey, FlowRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str =
        "2024-01-01T00:00:00,10.0.0.1,ALLOW,192.168.1.5,93.184.216.34,443,6,,,10,500,8,400";

    #[test]
    fn test_split_positional_fields() {
        let raw = RawConnection::split(LINE).unwrap();
        assert_eq!(raw.timestamp, "2024-01-01T00:00:00");
        assert_eq!(raw.firewall_ip, "10.0.0.1");
        assert_eq!(raw.source_ip, "192.168.1.5");
        assert_eq!(raw.destination_ip, "93.184.216.34");
        assert_eq!(raw.destination_port, "443");
        assert_eq!(raw.protocol_id, "6");
        assert_eq!(raw.counters, ["10", "500", "8", "400"]);
    }

    #[test]
    fn test_split_ignores_trailing_fields_and_newline() {
        let line = format!("{},extra,more\r\n", LINE);
        let raw = RawConnection::split(&line).unwrap();
        assert_eq!(raw.counters, ["10", "500", "8", "400"]);
    }

    #[test]
    fn test_split_short_record() {
        let err = RawConnection::split("a,b,c").unwrap_err();
        assert_eq!(
            err,
            LineError::ShortRecord {
                fields: 3,
                required: 13
            }
        );

        // A blank line still splits into one (empty) field.
        let err = RawConnection::split("\n").unwrap_err();
        assert_eq!(
            err,
            LineError::ShortRecord {
                fields: 1,
                required: 13
            }
        );
    }

    #[test]
    fn test_require_counters_names_first_empty_field() {
        let line = "t,fw,a,s,d,80,6,,,1,2,3,";
        let raw = RawConnection::split(line).unwrap();
        assert_eq!(
            raw.require_counters(),
            Err(LineError::IncompleteCounters { field: "bytes-out" })
        );
    }

    #[test]
    fn test_parse_counters_tolerates_padding() {
        let line = "t,fw,a,s,d,80,6,,, 1,2 ,3,4";
        let conn = RawConnection::split(line).unwrap().parse_counters().unwrap();
        assert_eq!(conn.packets_in, 1);
        assert_eq!(conn.bytes_in, 2);
    }

    #[test]
    fn test_parse_counters_malformed() {
        let line = "t,fw,a,s,d,80,6,,,abc,2,3,4";
        let err = RawConnection::split(line)
            .unwrap()
            .parse_counters()
            .unwrap_err();
        assert_eq!(
            err,
            LineError::MalformedCounter {
                field: "packets-in",
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_parse_counters_digit_groups() {
        let line = "t,fw,a,s,d,80,6,,,1_000, 2_500_000 ,-1_0,+7";
        let conn = RawConnection::split(line).unwrap().parse_counters().unwrap();
        assert_eq!(conn.packets_in, 1000);
        assert_eq!(conn.bytes_in, 2_500_000);
        assert_eq!(conn.packets_out, -10);
        assert_eq!(conn.bytes_out, 7);

        for bad in ["_1", "1_", "1__0", "-_1", "_"] {
            let line = format!("t,fw,a,s,d,80,6,,,{},2,3,4", bad);
            let err = RawConnection::split(&line)
                .unwrap()
                .parse_counters()
                .unwrap_err();
            assert_eq!(
                err,
                LineError::MalformedCounter {
                    field: "packets-in",
                    value: bad.to_string()
                }
            );
        }
    }

    #[test]
    fn test_flow_key_format() {
        let conn = RawConnection::split(LINE).unwrap().parse_counters().unwrap();
        assert_eq!(
            conn.flow_key().as_str(),
            "10.0.0.1_192.168.1.5_93.184.216.34_443_6"
        );
    }

    #[test]
    fn test_flow_key_is_case_sensitive() {
        let a = FlowKey::new("fw", "a", "b", "80", "tcp");
        let b = FlowKey::new("fw", "a", "b", "80", "TCP");
        assert_ne!(a, b);
    }

    #[test]
    fn test_flow_record_serializes_kebab_case() {
        let conn = RawConnection::split(LINE).unwrap().parse_counters().unwrap();
        let record = FlowRecord::from_connection(conn.flow_key(), &conn);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["key"], "10.0.0.1_192.168.1.5_93.184.216.34_443_6");
        assert_eq!(value["source-ip"], "192.168.1.5");
        assert_eq!(value["destination-ip"], "93.184.216.34");
        assert_eq!(value["packets-in"], 10);
        assert_eq!(value["bytes-in"], 500);
        assert_eq!(value["packets-out"], 8);
        assert_eq!(value["bytes-out"], 400);
        assert_eq!(value["count"], 1);
    }

    #[test]
    fn test_run_counters_accepted() {
        let mut counters = RunCounters {
            connections: 10,
            session_close: 6,
            ..Default::default()
        };
        counters.reject(&LineError::MalformedCounter {
            field: "bytes-in",
            value: "-".to_string(),
        });
        assert_eq!(counters.malformed_counters, 1);
        assert_eq!(counters.accepted(), 5);
    }
}
