//! Prometheus metrics for txops.
//!
//! Covers:
//! - Ingest acceptance/rejection and per-worker queue depth
//! - Processing time distribution of terminal transactions
//! - Fan-out stage applications and ignored duplicates
//! - Fraud flags, review requests, daily-limit breaches, fee mismatches
//! - Threshold registry version and reload outcomes
//! - Bucket classification labels
//! - Durable log appends, timeout sweeps, retention pruning
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, register_int_gauge,
    register_int_gauge_vec, Counter, CounterVec, Encoder, HistogramVec, IntGauge, IntGaugeVec,
    TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

// ============================================================================
// Ingest
// ============================================================================

/// Events accepted at ingest. Labels: status
pub static INGEST_ACCEPTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_ingest_accepted_total",
        "Total lifecycle events accepted at ingest",
        &["status"]
    )
    .unwrap()
});

/// Events rejected at ingest. Labels: reason
pub static INGEST_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_ingest_rejected_total",
        "Total lifecycle events rejected at ingest",
        &["reason"]
    )
    .unwrap()
});

/// Facts waiting in each worker queue.
pub static QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "txops_queue_depth",
        "Facts queued per worker",
        &["worker"]
    )
    .unwrap()
});

/// Non-terminal transactions known to the state machine.
pub static OPEN_TRANSACTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "txops_open_transactions",
        "Transactions not yet in a terminal status"
    )
    .unwrap()
});

/// Processing time of terminal transactions in seconds. Labels: status
pub static PROCESSING_TIME_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "txops_processing_time_seconds",
        "Processing time of terminal transactions in seconds",
        &["status"],
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 90.0, 120.0, 300.0, 600.0, 1800.0]
    )
    .unwrap()
});

// ============================================================================
// Fan-out stages
// ============================================================================

/// Facts applied per stage. Labels: stage (user_stats/hourly/fraud)
pub static STAGE_APPLIED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_stage_applied_total",
        "Facts applied by each fan-out stage",
        &["stage"]
    )
    .unwrap()
});

/// Duplicate facts ignored per stage. Labels: stage
pub static STAGE_DUPLICATE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_stage_duplicate_total",
        "Duplicate facts ignored by each fan-out stage",
        &["stage"]
    )
    .unwrap()
});

/// Stage errors. Labels: stage
pub static STAGE_ERROR_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_stage_error_total",
        "Errors raised by each fan-out stage",
        &["stage"]
    )
    .unwrap()
});

// ============================================================================
// Fraud / review
// ============================================================================

/// Transactions flagged by the fraud policy.
pub static FRAUD_FLAGGED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "txops_fraud_flagged_total",
        "Transactions flagged by the fraud policy"
    )
    .unwrap()
});

/// Review requests submitted. Labels: reason
pub static REVIEW_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_review_requests_total",
        "Review requests submitted to the validation collaborator",
        &["reason"]
    )
    .unwrap()
});

/// Review requests dropped because the dispatch queue was full.
pub static REVIEW_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "txops_review_dropped_total",
        "Review requests dropped on a full dispatch queue"
    )
    .unwrap()
});

/// Daily limit breaches. Labels: tier
pub static DAILY_LIMIT_EXCEEDED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_daily_limit_exceeded_total",
        "Users exceeding their tier daily limit",
        &["tier"]
    )
    .unwrap()
});

/// Fee does not match the configured commission. Labels: operation
pub static FEE_MISMATCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_fee_mismatch_total",
        "Transactions whose fee differs from the configured commission",
        &["operation"]
    )
    .unwrap()
});

// ============================================================================
// Registry
// ============================================================================

/// Installed threshold snapshot version.
pub static CONFIG_VERSION: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "txops_config_version",
        "Version of the installed threshold snapshot"
    )
    .unwrap()
});

/// Threshold reloads. Labels: outcome (applied/unchanged/failed)
pub static CONFIG_RELOAD_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_config_reload_total",
        "Threshold reload attempts by outcome",
        &["outcome"]
    )
    .unwrap()
});

// ============================================================================
// Aggregates / persistence
// ============================================================================

/// Bucket classifications computed. Labels: label
pub static BUCKET_CLASSIFIED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_bucket_classified_total",
        "Hour bucket classifications computed",
        &["label"]
    )
    .unwrap()
});

/// Hour buckets held in memory.
pub static ACTIVE_BUCKETS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("txops_active_buckets", "Hour buckets held in memory").unwrap()
});

/// Hour buckets dropped by retention.
pub static BUCKETS_PRUNED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "txops_buckets_pruned_total",
        "Hour buckets dropped by the retention window"
    )
    .unwrap()
});

/// Transactions failed by the timeout sweep.
pub static TIMEOUTS_SWEPT_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "txops_timeouts_swept_total",
        "Transactions failed by the timeout sweep"
    )
    .unwrap()
});

/// Durable log appends. Labels: result (ok/error)
pub static LOG_APPENDS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "txops_log_appends_total",
        "Durable log append attempts by result",
        &["result"]
    )
    .unwrap()
});

/// Facts replayed from the durable log at startup.
pub static LOG_REPLAYED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "txops_log_replayed_total",
        "Records replayed from the durable log"
    )
    .unwrap()
});

/// Metrics helper for recording values.
pub struct Metrics;

impl Metrics {
    /// Record an accepted ingest event.
    pub fn ingest_accepted(status: &str) {
        INGEST_ACCEPTED_TOTAL.with_label_values(&[status]).inc();
    }

    /// Record a rejected ingest event.
    pub fn ingest_rejected(reason: &str) {
        INGEST_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Set a worker's queue depth.
    pub fn queue_depth(worker: usize, depth: usize) {
        QUEUE_DEPTH
            .with_label_values(&[&worker.to_string()])
            .set(depth as i64);
    }

    pub fn open_transactions(count: usize) {
        OPEN_TRANSACTIONS.set(count as i64);
    }

    /// Record processing time of a terminal transaction.
    pub fn processing_time(status: &str, seconds: f64) {
        PROCESSING_TIME_SECONDS
            .with_label_values(&[status])
            .observe(seconds);
    }

    pub fn stage_applied(stage: &str) {
        STAGE_APPLIED_TOTAL.with_label_values(&[stage]).inc();
    }

    pub fn stage_duplicate(stage: &str) {
        STAGE_DUPLICATE_TOTAL.with_label_values(&[stage]).inc();
    }

    pub fn stage_error(stage: &str) {
        STAGE_ERROR_TOTAL.with_label_values(&[stage]).inc();
    }

    pub fn fraud_flagged() {
        FRAUD_FLAGGED_TOTAL.inc();
    }

    pub fn review_requested(reason: &str) {
        REVIEW_REQUESTS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn review_dropped() {
        REVIEW_DROPPED_TOTAL.inc();
    }

    pub fn daily_limit_exceeded(tier: &str) {
        DAILY_LIMIT_EXCEEDED_TOTAL.with_label_values(&[tier]).inc();
    }

    pub fn fee_mismatch(operation: &str) {
        FEE_MISMATCH_TOTAL.with_label_values(&[operation]).inc();
    }

    /// Record the installed threshold snapshot version.
    pub fn config_version(version: u64) {
        CONFIG_VERSION.set(version as i64);
    }

    pub fn config_reload(outcome: &str) {
        CONFIG_RELOAD_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn bucket_classified(label: &str) {
        BUCKET_CLASSIFIED_TOTAL.with_label_values(&[label]).inc();
    }

    pub fn active_buckets(count: usize) {
        ACTIVE_BUCKETS.set(count as i64);
    }

    pub fn buckets_pruned(count: usize) {
        BUCKETS_PRUNED_TOTAL.inc_by(count as f64);
    }

    pub fn timeouts_swept(count: usize) {
        TIMEOUTS_SWEPT_TOTAL.inc_by(count as f64);
    }

    pub fn log_append(ok: bool) {
        let result = if ok { "ok" } else { "error" };
        LOG_APPENDS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn log_replayed(count: usize) {
        LOG_REPLAYED_TOTAL.inc_by(count as f64);
    }
}

/// Encode every registered metric in the Prometheus text format.
pub fn gather_text() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}
