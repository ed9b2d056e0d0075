//! Analysis modules.
//!
//! The aggregator is the only stage: it turns log lines into flow records.

pub mod aggregator;

pub use aggregator::*;
