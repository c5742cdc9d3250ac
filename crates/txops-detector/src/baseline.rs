//! Baselines built from prior hour buckets.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use txops_aggregator::{HourBucket, HourlyAggregator};
use txops_core::BucketKey;

/// Which prior buckets a baseline averages over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaselineWindow {
    /// The `hours` hours immediately before the bucket.
    TrailingHours { hours: u32 },
    /// The same hour-of-day on each of the previous `days` days.
    SameHourTrailingDays { days: u32 },
    /// Every stored bucket before this one.
    AllTime,
}

impl Default for BaselineWindow {
    fn default() -> Self {
        Self::TrailingHours { hours: 24 }
    }
}

impl BaselineWindow {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::TrailingHours { hours: 0 } => {
                Err("baseline trailing hours must be at least 1".to_string())
            }
            Self::SameHourTrailingDays { days: 0 } => {
                Err("baseline trailing days must be at least 1".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Keys the window covers for `key`, or `None` for `AllTime`.
    pub fn keys(&self, key: BucketKey) -> Option<Vec<BucketKey>> {
        match *self {
            Self::TrailingHours { hours } => {
                let mut keys = Vec::with_capacity(hours as usize);
                let mut cursor = key;
                for _ in 0..hours {
                    cursor = cursor.prev();
                    keys.push(cursor);
                }
                Some(keys)
            }
            Self::SameHourTrailingDays { days } => Some(
                (1..=i64::from(days))
                    .map(|d| key.days_before(d))
                    .collect(),
            ),
            Self::AllTime => None,
        }
    }
}

/// Mean activity over a set of prior buckets.
///
/// Averages are over buckets that exist; hours without any recorded outcome
/// are not part of the sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Baseline {
    pub avg_count: f64,
    /// Latency-weighted mean processing time, if any sample had latency.
    pub avg_processing_time: Option<f64>,
    pub sample_buckets: usize,
}

impl Baseline {
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sample_buckets == 0
    }

    pub fn from_buckets<'a>(buckets: impl IntoIterator<Item = &'a HourBucket>) -> Self {
        let mut sample_buckets = 0usize;
        let mut total = 0u64;
        let mut latency_sum = 0.0;
        let mut latency_count = 0u64;

        for bucket in buckets {
            sample_buckets += 1;
            total += bucket.stats.total;
            latency_sum += bucket.stats.latency.sum();
            latency_count += bucket.stats.latency.count();
        }

        if sample_buckets == 0 {
            return Self::empty();
        }
        Self {
            avg_count: total as f64 / sample_buckets as f64,
            avg_processing_time: (latency_count > 0).then(|| latency_sum / latency_count as f64),
            sample_buckets,
        }
    }

    /// Baseline for `key` from the aggregator's stored buckets.
    pub fn for_key(aggregator: &HourlyAggregator, key: BucketKey, window: BaselineWindow) -> Self {
        match window.keys(key) {
            Some(keys) => {
                let snapshots: Vec<_> = keys.into_iter().filter_map(|k| aggregator.get(k)).collect();
                Self::from_buckets(snapshots.iter().map(|s| s.bucket()))
            }
            None => {
                let snapshots: Vec<_> = aggregator
                    .snapshots()
                    .into_iter()
                    .filter(|s| s.key() < key)
                    .collect();
                Self::from_buckets(snapshots.iter().map(|s| s.bucket()))
            }
        }
    }

    /// Stable identity of this baseline, for caching classifications.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.avg_count.to_bits().hash(&mut hasher);
        self.avg_processing_time.map(f64::to_bits).hash(&mut hasher);
        self.sample_buckets.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use txops_aggregator::TransactionOutcome;
    use txops_core::{Asset, OperationType, TransactionId, TransactionStatus, UserId};

    fn key(day: u32, hour: u32) -> BucketKey {
        BucketKey::from_timestamp(Utc.with_ymd_and_hms(2024, 7, day, hour, 0, 0).unwrap())
    }

    fn fill(agg: &HourlyAggregator, key: BucketKey, count: u64, secs: i64, id_base: u64) {
        for i in 0..count {
            agg.record(
                key,
                &TransactionOutcome {
                    transaction_id: TransactionId::new(id_base + i),
                    user_id: UserId::new(1),
                    operation: OperationType::Swap,
                    asset: Asset::new("ETH"),
                    status: TransactionStatus::Successful,
                    amount_usd: dec!(10),
                    fee_usd: dec!(0),
                    processing_time_seconds: Some(secs),
                    flagged: false,
                    manual_review: false,
                    slow: false,
                    failure_reason: None,
                    payment_method: None,
                },
            );
        }
    }

    #[test]
    fn test_trailing_hours_keys_cross_midnight() {
        let keys = BaselineWindow::TrailingHours { hours: 3 }
            .keys(key(2, 1))
            .unwrap();
        assert_eq!(keys, vec![key(2, 0), key(1, 23), key(1, 22)]);
    }

    #[test]
    fn test_same_hour_keys() {
        let keys = BaselineWindow::SameHourTrailingDays { days: 2 }
            .keys(key(3, 18))
            .unwrap();
        assert_eq!(keys, vec![key(2, 18), key(1, 18)]);
    }

    #[test]
    fn test_baseline_averages_existing_buckets() {
        let agg = HourlyAggregator::default();
        fill(&agg, key(1, 8), 10, 20, 0);
        fill(&agg, key(1, 9), 30, 40, 100);

        let baseline = Baseline::for_key(&agg, key(1, 10), BaselineWindow::TrailingHours { hours: 4 });
        assert_eq!(baseline.sample_buckets, 2);
        assert_eq!(baseline.avg_count, 20.0);
        // (10*20 + 30*40) / 40
        assert_eq!(baseline.avg_processing_time, Some(35.0));
    }

    #[test]
    fn test_all_time_excludes_current_and_later() {
        let agg = HourlyAggregator::default();
        fill(&agg, key(1, 8), 10, 1, 0);
        fill(&agg, key(1, 10), 50, 1, 100);
        fill(&agg, key(1, 11), 70, 1, 200);

        let baseline = Baseline::for_key(&agg, key(1, 10), BaselineWindow::AllTime);
        assert_eq!(baseline.sample_buckets, 1);
        assert_eq!(baseline.avg_count, 10.0);
    }

    #[test]
    fn test_empty_baseline() {
        let agg = HourlyAggregator::default();
        let baseline = Baseline::for_key(&agg, key(1, 0), BaselineWindow::default());
        assert!(baseline.is_empty());
        assert_eq!(baseline.avg_processing_time, None);
    }

    #[test]
    fn test_fingerprint_tracks_values() {
        let a = Baseline {
            avg_count: 10.0,
            avg_processing_time: Some(5.0),
            sample_buckets: 3,
        };
        let mut b = a;
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.avg_count = 11.0;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
