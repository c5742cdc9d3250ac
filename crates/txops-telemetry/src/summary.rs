//! Periodic telemetry summary.
//!
//! Reads the process counters back out of the Prometheus registry and logs a
//! compact summary:
//! - accepted / rejected events (by reason)
//! - processing time distribution (P50/P95/P99, from histogram buckets)
//! - fraud flags, review requests, fee mismatches
//! - installed threshold version

use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::metrics::{
    CONFIG_VERSION, FEE_MISMATCH_TOTAL, FRAUD_FLAGGED_TOTAL, INGEST_ACCEPTED_TOTAL,
    INGEST_REJECTED_TOTAL, PROCESSING_TIME_SECONDS, REVIEW_DROPPED_TOTAL, REVIEW_REQUESTS_TOTAL,
};

/// Counter snapshot for one summary period.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySummary {
    pub since: DateTime<Utc>,
    pub accepted_total: u64,
    pub rejected: BTreeMap<String, u64>,
    pub processing_time_p50_secs: f64,
    pub processing_time_p95_secs: f64,
    pub processing_time_p99_secs: f64,
    pub fraud_flagged: u64,
    pub review_requests: u64,
    pub review_dropped: u64,
    pub fee_mismatches: u64,
    pub config_version: i64,
}

impl TelemetrySummary {
    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }
}

/// Periodic summary reporter.
pub struct SummaryReporter {
    start_time: DateTime<Utc>,
}

impl Default for SummaryReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryReporter {
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
        }
    }

    /// Current counter values.
    pub fn get_summary(&self) -> TelemetrySummary {
        let (p50, p95, p99) = histogram_percentiles(&PROCESSING_TIME_SECONDS);
        TelemetrySummary {
            since: self.start_time,
            accepted_total: counter_vec_total(&INGEST_ACCEPTED_TOTAL),
            rejected: counter_vec_by_label(&INGEST_REJECTED_TOTAL),
            processing_time_p50_secs: p50,
            processing_time_p95_secs: p95,
            processing_time_p99_secs: p99,
            fraud_flagged: FRAUD_FLAGGED_TOTAL.get() as u64,
            review_requests: counter_vec_total(&REVIEW_REQUESTS_TOTAL),
            review_dropped: REVIEW_DROPPED_TOTAL.get() as u64,
            fee_mismatches: counter_vec_total(&FEE_MISMATCH_TOTAL),
            config_version: CONFIG_VERSION.get(),
        }
    }

    /// Output the summary to logs.
    pub fn output_summary(&self) {
        let s = self.get_summary();
        let duration = Utc::now() - self.start_time;
        let hours = duration.num_hours();
        let minutes = duration.num_minutes() % 60;

        info!("========== Telemetry Summary ==========");
        info!(
            "Period: {} ({} hours {} minutes)",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            hours,
            minutes
        );
        info!(
            "  Events: accepted={}, rejected={} {:?}",
            s.accepted_total,
            s.rejected_total(),
            s.rejected
        );
        info!(
            "  Processing time (s): P50={:.1}, P95={:.1}, P99={:.1}",
            s.processing_time_p50_secs, s.processing_time_p95_secs, s.processing_time_p99_secs
        );
        info!(
            "  Fraud: flagged={}, reviews={}, dropped={}, fee mismatches={}",
            s.fraud_flagged, s.review_requests, s.review_dropped, s.fee_mismatches
        );
        info!("  Threshold version: {}", s.config_version);
        info!("=======================================");
    }
}

fn counter_vec_by_label(counter: &prometheus::CounterVec) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    for mf in counter.collect() {
        for m in mf.get_metric() {
            let label = m
                .get_label()
                .first()
                .map(|pair| pair.get_value().to_string())
                .unwrap_or_default();
            *out.entry(label).or_insert(0) += m.get_counter().get_value() as u64;
        }
    }
    out
}

fn counter_vec_total(counter: &prometheus::CounterVec) -> u64 {
    counter_vec_by_label(counter).values().sum()
}

/// (p50, p95, p99) over every label combination of a histogram.
fn histogram_percentiles(histogram: &prometheus::HistogramVec) -> (f64, f64, f64) {
    let mut bounds: Vec<f64> = Vec::new();
    let mut cumulative: Vec<u64> = Vec::new();
    let mut total = 0u64;

    for mf in histogram.collect() {
        for m in mf.get_metric() {
            let h = m.get_histogram();
            total += h.get_sample_count();
            for (i, bucket) in h.get_bucket().iter().enumerate() {
                if bounds.len() <= i {
                    bounds.push(bucket.get_upper_bound());
                    cumulative.push(0);
                }
                cumulative[i] += bucket.get_cumulative_count();
            }
        }
    }

    if total == 0 {
        return (0.0, 0.0, 0.0);
    }
    (
        percentile_from_buckets(&bounds, &cumulative, total, 0.50),
        percentile_from_buckets(&bounds, &cumulative, total, 0.95),
        percentile_from_buckets(&bounds, &cumulative, total, 0.99),
    )
}

/// Percentile from cumulative histogram buckets, interpolating linearly
/// within the bucket that crosses the target rank.
fn percentile_from_buckets(bounds: &[f64], cumulative: &[u64], total: u64, percentile: f64) -> f64 {
    let target = (total as f64 * percentile) as u64;
    let mut prev_bound = 0.0;
    let mut prev_count = 0u64;

    for (upper_bound, cumulative_count) in bounds.iter().zip(cumulative) {
        if *cumulative_count >= target {
            let bucket_count = cumulative_count - prev_count;
            if bucket_count == 0 {
                return *upper_bound;
            }
            let position = (target - prev_count) as f64 / bucket_count as f64;
            return prev_bound + position * (upper_bound - prev_bound);
        }
        prev_bound = *upper_bound;
        prev_count = *cumulative_count;
    }

    // Target lies in the +Inf bucket
    bounds.last().copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;

    #[test]
    fn test_percentile_interpolation() {
        let bounds = [10.0, 20.0, 30.0];
        let cumulative = [50, 90, 100];
        // 50th sample is the top of the first bucket
        assert_eq!(percentile_from_buckets(&bounds, &cumulative, 100, 0.50), 10.0);
        // 70th sample is halfway through the second bucket
        assert_eq!(percentile_from_buckets(&bounds, &cumulative, 100, 0.70), 15.0);
    }

    #[test]
    fn test_percentile_beyond_last_bound() {
        let bounds = [10.0];
        let cumulative = [1];
        assert_eq!(percentile_from_buckets(&bounds, &cumulative, 10, 0.99), 10.0);
    }

    #[test]
    fn test_summary_reads_counters() {
        Metrics::ingest_accepted("successful");
        Metrics::ingest_rejected("validation");
        Metrics::processing_time("successful", 47.0);

        let summary = SummaryReporter::new().get_summary();
        assert!(summary.accepted_total >= 1);
        assert!(summary.rejected.get("validation").copied().unwrap_or(0) >= 1);
        assert!(summary.processing_time_p99_secs > 0.0);
        SummaryReporter::new().output_summary();
    }
}
