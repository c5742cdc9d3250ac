//! Hourly operational metrics.
//!
//! One [`HourBucket`] per `(date, hour)` of transaction start. Each bucket has
//! its own writer mutex and publishes an immutable [`BucketSnapshot`] after
//! every mutation; readers only ever load snapshots. Derived rates and the
//! classification label are computed lazily on the snapshot, so a mutation
//! (which publishes a fresh snapshot) discards them.
//!
//! A published bucket only holds fixed-size state (counters, maps keyed by
//! enums or assets, the bounded latency sketch). The seen-id set and the
//! distinct-user set grow with traffic and stay on the slot.

use arc_swap::ArcSwap;
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use txops_core::{
    Asset, BucketKey, Classification, OperationType, PaymentMethod, TransactionId,
    TransactionStatus, UserId,
};

use crate::outcome::TransactionOutcome;
use crate::sketch::{Percentiles, QuantileSketch};

/// Default retention: 90 days.
pub const DEFAULT_RETENTION_HOURS: u32 = 90 * 24;

// ============================================================================
// OutcomeStats
// ============================================================================

/// Successful volume of one asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetVolume {
    pub count: u64,
    pub volume_usd: Decimal,
}

/// Count and summed processing time, for a plain mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeanTime {
    pub count: u64,
    pub total_seconds: i64,
}

impl MeanTime {
    pub fn add(&mut self, seconds: i64) {
        self.count += 1;
        self.total_seconds += seconds;
    }

    pub fn merge(&mut self, other: &MeanTime) {
        self.count += other.count;
        self.total_seconds += other.total_seconds;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total_seconds as f64 / self.count as f64)
    }
}

/// Outcomes funded through one payment method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PaymentMethodStats {
    pub count: u64,
    pub failed: u64,
    pub processing_time: MeanTime,
}

impl PaymentMethodStats {
    pub fn error_rate(&self) -> f64 {
        OutcomeStats::ratio(self.failed, self.count)
    }

    pub fn avg_processing_time(&self) -> Option<f64> {
        self.processing_time.mean()
    }
}

/// Additive statistics over a set of terminal outcomes.
///
/// Used both for a single hour and for window rollups (`merge`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutcomeStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub by_operation: BTreeMap<OperationType, u64>,
    pub flagged: u64,
    pub manual_review: u64,
    pub slow: u64,
    /// Principal of successful outcomes.
    pub volume_usd: Decimal,
    /// Fees of successful outcomes.
    pub fees_usd: Decimal,
    pub assets: BTreeMap<Asset, AssetVolume>,
    pub failure_reasons: BTreeMap<String, u64>,
    pub max_processing_time_seconds: Option<i64>,
    /// Processing times of successful and failed outcomes.
    pub latency: QuantileSketch,
    /// Outcomes that carried a payment method.
    pub by_payment_method: BTreeMap<PaymentMethod, PaymentMethodStats>,
    /// Processing time of outcomes that went through manual review.
    pub manual_processing_time: MeanTime,
    /// Processing time of outcomes that did not.
    pub auto_processing_time: MeanTime,
}

impl OutcomeStats {
    pub fn apply(&mut self, outcome: &TransactionOutcome) {
        self.total += 1;
        match outcome.status {
            TransactionStatus::Successful => {
                self.successful += 1;
                self.volume_usd += outcome.amount_usd;
                self.fees_usd += outcome.fee_usd;
                let asset = self.assets.entry(outcome.asset.clone()).or_default();
                asset.count += 1;
                asset.volume_usd += outcome.amount_usd;
            }
            TransactionStatus::Failed => {
                self.failed += 1;
                let reason = outcome
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "unspecified".to_string());
                *self.failure_reasons.entry(reason).or_insert(0) += 1;
            }
            TransactionStatus::Cancelled => self.cancelled += 1,
            TransactionStatus::Pending | TransactionStatus::Processing => {}
        }

        *self.by_operation.entry(outcome.operation).or_insert(0) += 1;
        if outcome.flagged {
            self.flagged += 1;
        }
        if outcome.manual_review {
            self.manual_review += 1;
        }
        if outcome.slow {
            self.slow += 1;
        }
        if let Some(secs) = outcome.processing_time_seconds {
            self.max_processing_time_seconds =
                Some(self.max_processing_time_seconds.map_or(secs, |m| m.max(secs)));
        }
        if let Some(secs) = outcome.timed_seconds() {
            self.latency.insert(secs as f64);
            if outcome.manual_review {
                self.manual_processing_time.add(secs);
            } else {
                self.auto_processing_time.add(secs);
            }
        }
        if let Some(method) = outcome.payment_method {
            let entry = self.by_payment_method.entry(method).or_default();
            entry.count += 1;
            if outcome.status == TransactionStatus::Failed {
                entry.failed += 1;
            }
            if let Some(secs) = outcome.timed_seconds() {
                entry.processing_time.add(secs);
            }
        }
    }

    pub fn merge(&mut self, other: &OutcomeStats) {
        self.total += other.total;
        self.successful += other.successful;
        self.failed += other.failed;
        self.cancelled += other.cancelled;
        for (op, count) in &other.by_operation {
            *self.by_operation.entry(*op).or_insert(0) += count;
        }
        self.flagged += other.flagged;
        self.manual_review += other.manual_review;
        self.slow += other.slow;
        self.volume_usd += other.volume_usd;
        self.fees_usd += other.fees_usd;
        for (asset, volume) in &other.assets {
            let entry = self.assets.entry(asset.clone()).or_default();
            entry.count += volume.count;
            entry.volume_usd += volume.volume_usd;
        }
        for (reason, count) in &other.failure_reasons {
            *self.failure_reasons.entry(reason.clone()).or_insert(0) += count;
        }
        self.max_processing_time_seconds = match (
            self.max_processing_time_seconds,
            other.max_processing_time_seconds,
        ) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.latency.merge(&other.latency);
        for (method, stats) in &other.by_payment_method {
            let entry = self.by_payment_method.entry(*method).or_default();
            entry.count += stats.count;
            entry.failed += stats.failed;
            entry.processing_time.merge(&stats.processing_time);
        }
        self.manual_processing_time.merge(&other.manual_processing_time);
        self.auto_processing_time.merge(&other.auto_processing_time);
    }

    fn ratio(part: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            part as f64 / total as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        Self::ratio(self.failed, self.total)
    }

    pub fn fraud_rate(&self) -> f64 {
        Self::ratio(self.flagged, self.total)
    }

    pub fn manual_review_rate(&self) -> f64 {
        Self::ratio(self.manual_review, self.total)
    }

    pub fn success_rate(&self) -> f64 {
        Self::ratio(self.successful, self.total)
    }

    /// Mean processing time of successful and failed outcomes.
    pub fn avg_processing_time(&self) -> Option<f64> {
        self.latency.mean()
    }

    pub fn derive(&self) -> DerivedRates {
        DerivedRates {
            error_rate: self.error_rate(),
            fraud_rate: self.fraud_rate(),
            manual_review_rate: self.manual_review_rate(),
            success_rate: self.success_rate(),
            avg_processing_time_seconds: self.avg_processing_time(),
            avg_manual_processing_time_seconds: self.manual_processing_time.mean(),
            avg_auto_processing_time_seconds: self.auto_processing_time.mean(),
            percentiles: self.latency.percentiles(),
        }
    }
}

/// Rates derived from an [`OutcomeStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedRates {
    pub error_rate: f64,
    pub fraud_rate: f64,
    pub manual_review_rate: f64,
    pub success_rate: f64,
    pub avg_processing_time_seconds: Option<f64>,
    pub avg_manual_processing_time_seconds: Option<f64>,
    pub avg_auto_processing_time_seconds: Option<f64>,
    pub percentiles: Option<Percentiles>,
}

// ============================================================================
// HourBucket / BucketSnapshot
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HourBucket {
    pub key: BucketKey,
    pub stats: OutcomeStats,
    /// Distinct users with a terminal outcome in this hour.
    pub active_users: usize,
    pub updated_at: DateTime<Utc>,
}

impl HourBucket {
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            stats: OutcomeStats::default(),
            active_users: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Immutable published view of a bucket with lazily derived values.
#[derive(Debug)]
pub struct BucketSnapshot {
    bucket: HourBucket,
    rates: OnceCell<DerivedRates>,
    classification: Mutex<Option<(u64, Classification)>>,
}

impl BucketSnapshot {
    fn new(bucket: HourBucket) -> Self {
        Self {
            bucket,
            rates: OnceCell::new(),
            classification: Mutex::new(None),
        }
    }

    pub fn bucket(&self) -> &HourBucket {
        &self.bucket
    }

    pub fn key(&self) -> BucketKey {
        self.bucket.key
    }

    pub fn stats(&self) -> &OutcomeStats {
        &self.bucket.stats
    }

    pub fn rates(&self) -> &DerivedRates {
        self.rates.get_or_init(|| self.bucket.stats.derive())
    }

    /// Classification against a baseline identified by `fingerprint`.
    ///
    /// Cached until the bucket mutates or a different baseline is used.
    pub fn classification(
        &self,
        fingerprint: u64,
        compute: impl FnOnce(&HourBucket) -> Classification,
    ) -> Classification {
        let mut cached = self.classification.lock();
        if let Some((fp, label)) = *cached {
            if fp == fingerprint {
                return label;
            }
        }
        let label = compute(&self.bucket);
        *cached = Some((fingerprint, label));
        label
    }
}

// ============================================================================
// HourlyAggregator
// ============================================================================

struct BucketWriter {
    bucket: HourBucket,
    seen: HashSet<TransactionId>,
}

struct BucketSlot {
    writer: Mutex<BucketWriter>,
    snapshot: ArcSwap<BucketSnapshot>,
    /// Inserted under the writer lock, read by window queries without it.
    users: DashSet<UserId>,
}

impl BucketSlot {
    fn new(key: BucketKey) -> Self {
        let bucket = HourBucket::new(key);
        Self {
            snapshot: ArcSwap::from_pointee(BucketSnapshot::new(bucket.clone())),
            writer: Mutex::new(BucketWriter {
                bucket,
                seen: HashSet::new(),
            }),
            users: DashSet::new(),
        }
    }
}

pub struct HourlyAggregator {
    buckets: DashMap<BucketKey, Arc<BucketSlot>>,
    retention: Duration,
}

impl Default for HourlyAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_HOURS)
    }
}

impl HourlyAggregator {
    pub fn new(retention_hours: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            retention: Duration::hours(i64::from(retention_hours.max(1))),
        }
    }

    /// Record a terminal outcome into the bucket for `key`.
    ///
    /// Returns `false` if this transaction was already recorded there.
    pub fn record(&self, key: BucketKey, outcome: &TransactionOutcome) -> bool {
        // Clone the slot out so the map shard is not held while writing.
        let slot = Arc::clone(
            self.buckets
                .entry(key)
                .or_insert_with(|| Arc::new(BucketSlot::new(key)))
                .value(),
        );

        let mut writer = slot.writer.lock();
        if !writer.seen.insert(outcome.transaction_id) {
            debug!(id = %outcome.transaction_id, bucket = %key, "Duplicate outcome ignored");
            return false;
        }
        writer.bucket.stats.apply(outcome);
        if slot.users.insert(outcome.user_id) {
            writer.bucket.active_users += 1;
        }
        writer.bucket.updated_at = Utc::now();
        slot.snapshot
            .store(Arc::new(BucketSnapshot::new(writer.bucket.clone())));
        true
    }

    pub fn get(&self, key: BucketKey) -> Option<Arc<BucketSnapshot>> {
        self.buckets.get(&key).map(|slot| slot.snapshot.load_full())
    }

    /// Buckets whose start lies in `[from, to]`, oldest first.
    ///
    /// Looks up each hour key in the range; cost is proportional to the
    /// number of hours, not to the number of stored buckets.
    pub fn window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Arc<BucketSnapshot>> {
        BucketKey::range(from, to)
            .into_iter()
            .filter_map(|key| self.get(key))
            .collect()
    }

    /// Distinct users with a terminal outcome in any of the `keys` buckets.
    ///
    /// Reads the live user sets, which may be ahead of published snapshots.
    pub fn active_users(&self, keys: impl IntoIterator<Item = BucketKey>) -> usize {
        let mut users = HashSet::new();
        for key in keys {
            if let Some(slot) = self.buckets.get(&key) {
                users.extend(slot.users.iter().map(|user| *user));
            }
        }
        users.len()
    }

    /// Every stored bucket, oldest first.
    pub fn snapshots(&self) -> Vec<Arc<BucketSnapshot>> {
        let mut all: Vec<_> = self
            .buckets
            .iter()
            .map(|slot| slot.snapshot.load_full())
            .collect();
        all.sort_by_key(|s| s.key());
        all
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Drop buckets that ended before `now - retention`.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let before = self.buckets.len();
        self.buckets.retain(|key, _| key.end() > cutoff);
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            info!(removed, %cutoff, "Pruned expired hour buckets");
        }
        removed
    }
}
