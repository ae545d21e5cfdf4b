//! # Commit Engine Metrics
//!
//! Prometheus metrics for monitoring the append pipeline.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! unilateral-consensus = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `ledger_blocks_appended_total` - Counter of committed blocks
//! - `ledger_append_conflicts_total` - Counter of lost insert races
//! - `ledger_events_rejected_total` - Counter of refused submissions (by reason)
//! - `ledger_append_latency_seconds` - Histogram of submission-to-commit time

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Histogram,
    IntCounter,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref BLOCKS_APPENDED: IntCounter = register_int_counter!(
        "ledger_blocks_appended_total",
        "Total number of blocks committed"
    )
    .expect("Failed to create BLOCKS_APPENDED metric");

    /// Duplicate-height inserts lost to a concurrent writer
    pub static ref APPEND_CONFLICTS: IntCounter = register_int_counter!(
        "ledger_append_conflicts_total",
        "Total number of block inserts that lost a height race"
    )
    .expect("Failed to create APPEND_CONFLICTS metric");

    pub static ref EVENTS_REJECTED: CounterVec = register_counter_vec!(
        "ledger_events_rejected_total",
        "Total number of submissions refused",
        &["reason"]
    )
    .expect("Failed to create EVENTS_REJECTED metric");

    pub static ref APPEND_LATENCY: Histogram = register_histogram!(
        "ledger_append_latency_seconds",
        "Time from submission to committed block in seconds",
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to create APPEND_LATENCY metric");
}

#[cfg(feature = "metrics")]
pub fn record_block_appended() {
    BLOCKS_APPENDED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_append_conflict() {
    APPEND_CONFLICTS.inc();
}

/// Record a refused submission with reason
#[cfg(feature = "metrics")]
pub fn record_event_rejected(reason: &str) {
    EVENTS_REJECTED.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_append_latency(seconds: f64) {
    APPEND_LATENCY.observe(seconds);
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_block_appended() {}

#[cfg(not(feature = "metrics"))]
pub fn record_append_conflict() {}

#[cfg(not(feature = "metrics"))]
pub fn record_event_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_append_latency(_seconds: f64) {}
