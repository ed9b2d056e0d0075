//! Line rejection reasons.
//!
//! None of these abort a run. The aggregator tallies them and moves on to
//! the next line; they exist so callers can see why a line was skipped.

/// Why a single log line did not contribute to any flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    /// Fewer than the 13 positional fields the format requires.
    #[error("short record: {fields} fields, need {required}")]
    ShortRecord { fields: usize, required: usize },

    /// One or more of the four traffic counters is empty.
    #[error("incomplete counters: {field} is empty")]
    IncompleteCounters { field: &'static str },

    /// A counter is present but not an integer.
    #[error("malformed counter: {field} = {value:?}")]
    MalformedCounter { field: &'static str, value: String },
}
