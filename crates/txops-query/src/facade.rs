//! Read-only views over the aggregators.
//!
//! Every operation touches only the buckets of its window (or one user
//! entry), and reads published snapshots, so queries never block ingest.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use txops_aggregator::{BucketSnapshot, HourlyAggregator, OutcomeStats, UserStatsAggregator};
use txops_core::{Asset, BucketKey, UserId};
use txops_detector::{compare_peak, BottleneckClassifier, PeakComparison};

use crate::error::{QueryError, QueryResult};
use crate::types::{
    payment_methods, AssetRanking, BucketReport, ManualReviewSplit, RealtimeMetrics, UserSummary,
};

#[derive(Clone)]
pub struct QueryFacade {
    hourly: Arc<HourlyAggregator>,
    users: Arc<UserStatsAggregator>,
    classifier: Arc<BottleneckClassifier>,
    max_window: Duration,
}

impl QueryFacade {
    pub fn new(
        hourly: Arc<HourlyAggregator>,
        users: Arc<UserStatsAggregator>,
        classifier: Arc<BottleneckClassifier>,
        max_window: Duration,
    ) -> Self {
        Self {
            hourly,
            users,
            classifier,
            max_window,
        }
    }

    fn window_snapshots(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> QueryResult<(DateTime<Utc>, Vec<Arc<BucketSnapshot>>)> {
        if window <= Duration::zero() {
            return Err(QueryError::InvalidWindow(format!(
                "{}s is not positive",
                window.num_seconds()
            )));
        }
        if window > self.max_window {
            return Err(QueryError::InvalidWindow(format!(
                "{}h exceeds the {}h limit",
                window.num_hours(),
                self.max_window.num_hours()
            )));
        }

        let from = now - window;
        let buckets = self.hourly.window(from, now);
        if buckets.is_empty() {
            return Err(QueryError::NotFound(format!(
                "no activity between {from} and {now}"
            )));
        }
        Ok((from, buckets))
    }

    fn merged(buckets: &[Arc<BucketSnapshot>]) -> OutcomeStats {
        let mut stats = OutcomeStats::default();
        for snapshot in buckets {
            stats.merge(snapshot.stats());
        }
        stats
    }

    pub fn realtime_metrics(&self, window: Duration) -> QueryResult<RealtimeMetrics> {
        self.realtime_metrics_at(Utc::now(), window)
    }

    /// Merge every bucket whose start lies in `[now - window, now]`.
    pub fn realtime_metrics_at(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> QueryResult<RealtimeMetrics> {
        let (from, buckets) = self.window_snapshots(now, window)?;
        let stats = Self::merged(&buckets);
        let active_users = self.hourly.active_users(buckets.iter().map(|b| b.key()));
        Ok(RealtimeMetrics::from_stats(
            from,
            now,
            buckets.len(),
            active_users,
            &stats,
        ))
    }

    pub fn user_summary(&self, user_id: UserId) -> QueryResult<UserSummary> {
        self.user_summary_at(Utc::now(), user_id)
    }

    pub fn user_summary_at(&self, now: DateTime<Utc>, user_id: UserId) -> QueryResult<UserSummary> {
        let stats = self
            .users
            .get(user_id)
            .ok_or_else(|| QueryError::NotFound(format!("{user_id}")))?;

        Ok(UserSummary {
            user_id,
            total_transactions: stats.total_transactions,
            total_volume_usd: stats.total_volume_usd,
            average_ticket_usd: stats.average_ticket_usd(),
            last_transaction_at: stats.last_transaction_at,
            days_since_last_transaction: stats
                .last_transaction_at
                .map(|at| (now - at).num_days().max(0)),
        })
    }

    pub fn top_assets(&self, window: Duration, limit: usize) -> QueryResult<Vec<AssetRanking>> {
        self.top_assets_at(Utc::now(), window, limit)
    }

    /// Assets ranked by successful volume over the window; ties by symbol.
    pub fn top_assets_at(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        limit: usize,
    ) -> QueryResult<Vec<AssetRanking>> {
        let (_, buckets) = self.window_snapshots(now, window)?;

        let mut volumes: BTreeMap<Asset, (u64, Decimal)> = BTreeMap::new();
        let mut total = Decimal::ZERO;
        for snapshot in &buckets {
            for (asset, volume) in &snapshot.stats().assets {
                let entry = volumes.entry(asset.clone()).or_default();
                entry.0 += volume.count;
                entry.1 += volume.volume_usd;
                total += volume.volume_usd;
            }
        }
        if volumes.is_empty() {
            return Err(QueryError::NotFound(
                "no successful transactions in window".to_string(),
            ));
        }

        let mut ranked: Vec<_> = volumes.into_iter().collect();
        ranked.sort_by(|(a_asset, (_, a_vol)), (b_asset, (_, b_vol))| {
            match b_vol.cmp(a_vol) {
                Ordering::Equal => a_asset.cmp(b_asset),
                other => other,
            }
        });

        Ok(ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (asset, (transactions, volume_usd)))| AssetRanking {
                rank: i + 1,
                asset,
                transactions,
                volume_usd,
                share_of_volume: if total.is_zero() {
                    0.0
                } else {
                    (volume_usd / total).to_f64().unwrap_or(0.0)
                },
            })
            .collect())
    }

    /// One bucket with its classification against the configured baseline.
    pub fn bucket_report(&self, key: BucketKey) -> QueryResult<BucketReport> {
        let snapshot = self
            .hourly
            .get(key)
            .ok_or_else(|| QueryError::NotFound(format!("bucket {key}")))?;

        let baseline = self.classifier.baseline_for(&self.hourly, &snapshot);
        let classification = self.classifier.classify_snapshot(&snapshot, &baseline);
        let stats = snapshot.stats();
        let rates = snapshot.rates();

        Ok(BucketReport {
            date: key.date(),
            hour: key.hour(),
            classification,
            baseline,
            total: stats.total,
            successful: stats.successful,
            failed: stats.failed,
            cancelled: stats.cancelled,
            volume_usd: stats.volume_usd,
            error_rate: rates.error_rate,
            fraud_rate: rates.fraud_rate,
            avg_processing_time_seconds: rates.avg_processing_time_seconds,
            processing_time_percentiles: rates.percentiles,
            failure_reasons: stats.failure_reasons.clone(),
            active_users: snapshot.bucket().active_users,
            manual_review_split: ManualReviewSplit::from_stats(stats),
            by_payment_method: payment_methods(stats),
            updated_at: snapshot.bucket().updated_at,
        })
    }

    pub fn peak_comparison(&self, window: Duration) -> QueryResult<PeakComparison> {
        self.peak_comparison_at(Utc::now(), window)
    }

    pub fn peak_comparison_at(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> QueryResult<PeakComparison> {
        let (_, buckets) = self.window_snapshots(now, window)?;
        Ok(compare_peak(&buckets))
    }
}
