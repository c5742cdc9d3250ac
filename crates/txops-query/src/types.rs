//! Query API types.
//!
//! Serializable snapshots returned by the facade and the HTTP API.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use txops_aggregator::{OutcomeStats, Percentiles};
use txops_core::{Asset, Classification, OperationType, PaymentMethod, UserId};
use txops_detector::Baseline;

/// Rollup of every bucket that started inside a window.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMetrics {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Buckets that contributed.
    pub buckets: usize,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub by_operation: BTreeMap<OperationType, u64>,
    pub volume_usd: Decimal,
    pub fees_usd: Decimal,
    pub active_users: usize,
    pub error_rate: f64,
    pub fraud_rate: f64,
    pub manual_review_rate: f64,
    pub success_rate: f64,
    pub avg_processing_time_seconds: Option<f64>,
    pub max_processing_time_seconds: Option<i64>,
    /// Merged from per-bucket sketches.
    pub processing_time_percentiles: Option<Percentiles>,
    pub manual_review_split: ManualReviewSplit,
    pub by_payment_method: BTreeMap<PaymentMethod, PaymentMethodReport>,
}

impl RealtimeMetrics {
    pub(crate) fn from_stats(
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        buckets: usize,
        active_users: usize,
        stats: &OutcomeStats,
    ) -> Self {
        let rates = stats.derive();
        Self {
            from,
            to,
            buckets,
            total: stats.total,
            successful: stats.successful,
            failed: stats.failed,
            cancelled: stats.cancelled,
            by_operation: stats.by_operation.clone(),
            volume_usd: stats.volume_usd,
            fees_usd: stats.fees_usd,
            active_users,
            error_rate: rates.error_rate,
            fraud_rate: rates.fraud_rate,
            manual_review_rate: rates.manual_review_rate,
            success_rate: rates.success_rate,
            avg_processing_time_seconds: rates.avg_processing_time_seconds,
            max_processing_time_seconds: stats.max_processing_time_seconds,
            processing_time_percentiles: rates.percentiles,
            manual_review_split: ManualReviewSplit::from_stats(stats),
            by_payment_method: payment_methods(stats),
        }
    }
}

/// Mean processing time with and without manual review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ManualReviewSplit {
    pub manual_count: u64,
    pub manual_avg_seconds: Option<f64>,
    pub auto_count: u64,
    pub auto_avg_seconds: Option<f64>,
}

impl ManualReviewSplit {
    pub(crate) fn from_stats(stats: &OutcomeStats) -> Self {
        Self {
            manual_count: stats.manual_processing_time.count,
            manual_avg_seconds: stats.manual_processing_time.mean(),
            auto_count: stats.auto_processing_time.count,
            auto_avg_seconds: stats.auto_processing_time.mean(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaymentMethodReport {
    pub transactions: u64,
    pub error_rate: f64,
    pub avg_processing_time_seconds: Option<f64>,
}

pub(crate) fn payment_methods(
    stats: &OutcomeStats,
) -> BTreeMap<PaymentMethod, PaymentMethodReport> {
    stats
        .by_payment_method
        .iter()
        .map(|(method, m)| {
            let report = PaymentMethodReport {
                transactions: m.count,
                error_rate: m.error_rate(),
                avg_processing_time_seconds: m.avg_processing_time(),
            };
            (*method, report)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user_id: UserId,
    pub total_transactions: u64,
    pub total_volume_usd: Decimal,
    pub average_ticket_usd: Option<Decimal>,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub days_since_last_transaction: Option<i64>,
}

/// One row of the top-assets ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRanking {
    pub rank: usize,
    pub asset: Asset,
    pub transactions: u64,
    pub volume_usd: Decimal,
    /// Fraction of the window's successful volume.
    pub share_of_volume: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketReport {
    pub date: NaiveDate,
    pub hour: u8,
    pub classification: Classification,
    pub baseline: Baseline,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub volume_usd: Decimal,
    pub error_rate: f64,
    pub fraud_rate: f64,
    pub avg_processing_time_seconds: Option<f64>,
    pub processing_time_percentiles: Option<Percentiles>,
    pub failure_reasons: BTreeMap<String, u64>,
    pub active_users: usize,
    pub manual_review_split: ManualReviewSplit,
    pub by_payment_method: BTreeMap<PaymentMethod, PaymentMethodReport>,
    pub updated_at: DateTime<Utc>,
}
