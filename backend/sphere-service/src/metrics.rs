//! Prometheus metrics for cross-entity consistency
//!
//! Tracks cascade sweeps, compensating rollbacks, integrity violations and
//! background repair actions.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

/// Comments removed by post cascades
static CASCADE_COMMENTS_DELETED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sphere_cascade_comments_deleted_total",
        "Comments deleted by post cascade sweeps",
        &["trigger"]
    )
    .expect("failed to register sphere_cascade_comments_deleted_total")
});

/// Duration of cascade sweeps
static CASCADE_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "sphere_cascade_duration_seconds",
        "Duration of post cascade sweeps",
        &["status"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0]
    )
    .expect("failed to register sphere_cascade_duration_seconds")
});

/// Compensating rollbacks of half-applied follow edges
static EDGE_COMPENSATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sphere_edge_compensations_total",
        "Compensating rollbacks for half-applied follow edge updates",
        &["operation", "status"]
    )
    .expect("failed to register sphere_edge_compensations_total")
});

/// Escalated integrity violations
static INTEGRITY_VIOLATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sphere_integrity_violations_total",
        "Cross-entity operations that exhausted their repair path",
        &["operation"]
    )
    .expect("failed to register sphere_integrity_violations_total")
});

/// Repairs applied by the background job
static REPAIRS_APPLIED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sphere_integrity_repairs_total",
        "Inconsistencies repaired by the background integrity job",
        &["kind"]
    )
    .expect("failed to register sphere_integrity_repairs_total")
});

/// Repair job cycles (success/error)
static REPAIR_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sphere_integrity_repair_runs_total",
        "Background integrity repair cycles",
        &["status"]
    )
    .expect("failed to register sphere_integrity_repair_runs_total")
});

pub fn record_cascade_comments_deleted(trigger: &str, count: usize) {
    CASCADE_COMMENTS_DELETED
        .with_label_values(&[trigger])
        .inc_by(count as u64);
}

pub fn record_cascade_duration(status: &str, duration: Duration) {
    CASCADE_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration.as_secs_f64());
}

pub fn record_edge_compensation(operation: &str, status: &str) {
    EDGE_COMPENSATIONS
        .with_label_values(&[operation, status])
        .inc();
}

pub fn record_integrity_violation(operation: &str) {
    INTEGRITY_VIOLATIONS.with_label_values(&[operation]).inc();
}

pub fn record_repair(kind: &str, count: usize) {
    if count > 0 {
        REPAIRS_APPLIED
            .with_label_values(&[kind])
            .inc_by(count as u64);
    }
}

pub fn record_repair_run(status: &str) {
    REPAIR_RUNS.with_label_values(&[status]).inc();
}

/// Render the default registry in the Prometheus text format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
