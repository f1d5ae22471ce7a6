//! # Consensus Metrics
//!
//! Prometheus metrics for monitoring the consensus engine.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! ds-consensus = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `consensus_headers_accepted_total` - Counter of accepted headers
//! - `consensus_headers_rejected_total` - Counter of rejected headers (by kind)
//! - `consensus_validation_latency_seconds` - Histogram of validation times
//! - `consensus_reorgs_total` - Counter of tip switches that disconnected blocks
//! - `consensus_reorg_depth` - Histogram of disconnected blocks per reorg
//! - `consensus_tip_height` - Height of the active tip

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, register_int_gauge,
    CounterVec, Histogram, IntCounter, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total headers accepted into the tree
    pub static ref HEADERS_ACCEPTED: IntCounter = register_int_counter!(
        "consensus_headers_accepted_total",
        "Total number of headers accepted"
    )
    .expect("Failed to create HEADERS_ACCEPTED metric");

    /// Total headers rejected, labeled by error kind
    pub static ref HEADERS_REJECTED: CounterVec = register_counter_vec!(
        "consensus_headers_rejected_total",
        "Total number of headers rejected",
        &["kind"]
    )
    .expect("Failed to create HEADERS_REJECTED metric");

    /// Histogram of header validation latency
    pub static ref VALIDATION_LATENCY: Histogram = register_histogram!(
        "consensus_validation_latency_seconds",
        "Time taken to validate a header in seconds",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    )
    .expect("Failed to create VALIDATION_LATENCY metric");

    /// Total reorganizations
    pub static ref REORGS: IntCounter = register_int_counter!(
        "consensus_reorgs_total",
        "Total number of chain reorganizations"
    )
    .expect("Failed to create REORGS metric");

    /// Blocks disconnected per reorganization
    pub static ref REORG_DEPTH: Histogram = register_histogram!(
        "consensus_reorg_depth",
        "Number of blocks disconnected by a reorganization",
        vec![1.0, 2.0, 3.0, 6.0, 10.0, 25.0, 100.0, 500.0]
    )
    .expect("Failed to create REORG_DEPTH metric");

    /// Active tip height
    pub static ref TIP_HEIGHT: IntGauge = register_int_gauge!(
        "consensus_tip_height",
        "Height of the active chain tip"
    )
    .expect("Failed to create TIP_HEIGHT metric");
}

/// Record an accepted header
#[cfg(feature = "metrics")]
pub fn record_header_accepted() {
    HEADERS_ACCEPTED.inc();
}

/// Record a rejected header with its error kind
#[cfg(feature = "metrics")]
pub fn record_header_rejected(kind: &str) {
    HEADERS_REJECTED.with_label_values(&[kind]).inc();
}

/// Record validation latency
#[cfg(feature = "metrics")]
pub fn record_validation_latency(seconds: f64) {
    VALIDATION_LATENCY.observe(seconds);
}

/// Record a reorganization of `depth` blocks
#[cfg(feature = "metrics")]
pub fn record_reorg(depth: u64) {
    REORGS.inc();
    REORG_DEPTH.observe(depth as f64);
}

#[cfg(feature = "metrics")]
pub fn set_tip_height(height: u64) {
    TIP_HEIGHT.set(height as i64);
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_header_accepted() {}

#[cfg(not(feature = "metrics"))]
pub fn record_header_rejected(_kind: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_validation_latency(_seconds: f64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_reorg(_depth: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn set_tip_height(_height: u64) {}
