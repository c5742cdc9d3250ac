//! Peak (18:00-23:59) versus off-peak comparison.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use txops_aggregator::{BucketSnapshot, OutcomeStats};

/// Activity of one period (peak or off-peak) over a set of buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub buckets: usize,
    pub transactions: u64,
    pub avg_transactions_per_hour: f64,
    pub volume_usd: Decimal,
    pub avg_processing_time_seconds: Option<f64>,
    pub p95_processing_time_seconds: Option<f64>,
    pub error_rate: f64,
    pub fraud_rate: f64,
}

impl PeriodStats {
    fn from_stats(buckets: usize, stats: &OutcomeStats) -> Self {
        Self {
            buckets,
            transactions: stats.total,
            avg_transactions_per_hour: if buckets == 0 {
                0.0
            } else {
                stats.total as f64 / buckets as f64
            },
            volume_usd: stats.volume_usd,
            avg_processing_time_seconds: stats.avg_processing_time(),
            p95_processing_time_seconds: stats.latency.quantile(0.95),
            error_rate: stats.error_rate(),
            fraud_rate: stats.fraud_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakComparison {
    pub peak: PeriodStats,
    pub off_peak: PeriodStats,
    /// Peak over off-peak hourly transaction rate; `None` without off-peak data.
    pub load_ratio: Option<f64>,
}

/// Split `buckets` by hour-of-day and compare the two periods.
pub fn compare_peak(buckets: &[Arc<BucketSnapshot>]) -> PeakComparison {
    let mut peak = OutcomeStats::default();
    let mut off_peak = OutcomeStats::default();
    let (mut peak_buckets, mut off_peak_buckets) = (0usize, 0usize);

    for snapshot in buckets {
        if snapshot.key().is_peak_hour() {
            peak.merge(snapshot.stats());
            peak_buckets += 1;
        } else {
            off_peak.merge(snapshot.stats());
            off_peak_buckets += 1;
        }
    }

    let peak = PeriodStats::from_stats(peak_buckets, &peak);
    let off_peak = PeriodStats::from_stats(off_peak_buckets, &off_peak);
    let load_ratio = (off_peak.avg_transactions_per_hour > 0.0)
        .then(|| peak.avg_transactions_per_hour / off_peak.avg_transactions_per_hour);

    PeakComparison {
        peak,
        off_peak,
        load_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use txops_aggregator::{HourlyAggregator, TransactionOutcome};
    use txops_core::{
        Asset, BucketKey, OperationType, TransactionId, TransactionStatus, UserId,
    };

    #[test]
    fn test_peak_vs_off_peak() {
        let agg = HourlyAggregator::default();
        let mut id = 0u64;
        for hour in [10u32, 11, 19, 20] {
            let key = BucketKey::from_timestamp(Utc.with_ymd_and_hms(2024, 7, 1, hour, 0, 0).unwrap());
            let count = if hour >= 18 { 30 } else { 10 };
            for _ in 0..count {
                agg.record(
                    key,
                    &TransactionOutcome {
                        transaction_id: TransactionId::new(id),
                        user_id: UserId::new(1),
                        operation: OperationType::Sell,
                        asset: Asset::new("SOL"),
                        status: TransactionStatus::Successful,
                        amount_usd: dec!(10),
                        fee_usd: dec!(0.05),
                        processing_time_seconds: Some(if hour >= 18 { 60 } else { 20 }),
                        flagged: false,
                        manual_review: false,
                        slow: false,
                        failure_reason: None,
                        payment_method: None,
                    },
                );
                id += 1;
            }
        }

        let comparison = compare_peak(&agg.snapshots());
        assert_eq!(comparison.peak.buckets, 2);
        assert_eq!(comparison.peak.transactions, 60);
        assert_eq!(comparison.off_peak.volume_usd, dec!(200));
        assert_eq!(comparison.load_ratio, Some(3.0));
        assert_eq!(comparison.peak.avg_processing_time_seconds, Some(60.0));
    }

    #[test]
    fn test_empty_input() {
        let comparison = compare_peak(&[]);
        assert_eq!(comparison.peak.transactions, 0);
        assert_eq!(comparison.load_ratio, None);
    }
}
