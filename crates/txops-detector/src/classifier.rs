//! Bucket classification.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use txops_aggregator::{BucketSnapshot, HourBucket, HourlyAggregator};
use txops_core::Classification;
use txops_telemetry::Metrics;

use crate::baseline::Baseline;
use crate::config::ClassifierConfig;
use crate::error::{DetectorError, DetectorResult};

/// Classify `bucket` against `baseline`. First match wins:
///
/// 1. `Bottleneck`: count above `multiplier × baseline.avg_count`
///    (never for an empty baseline)
/// 2. `Slow`: mean processing time above the slow threshold
/// 3. `HighErrorRate`: error rate above the threshold
/// 4. `Normal`
pub fn classify(
    bucket: &HourBucket,
    baseline: &Baseline,
    config: &ClassifierConfig,
) -> Classification {
    let stats = &bucket.stats;

    if !baseline.is_empty()
        && stats.total as f64 > config.bottleneck_multiplier * baseline.avg_count
    {
        return Classification::Bottleneck;
    }

    if stats
        .avg_processing_time()
        .is_some_and(|avg| avg > config.slow_threshold_secs)
    {
        return Classification::Slow;
    }

    if stats.error_rate() > config.error_rate_threshold {
        return Classification::HighErrorRate;
    }

    Classification::Normal
}

/// Classifier bound to a validated configuration.
#[derive(Debug, Clone)]
pub struct BottleneckClassifier {
    config: ClassifierConfig,
}

impl BottleneckClassifier {
    pub fn new(config: ClassifierConfig) -> DetectorResult<Self> {
        config.validate().map_err(DetectorError::ConfigError)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Baseline for a bucket under the configured window.
    pub fn baseline_for(&self, aggregator: &HourlyAggregator, snapshot: &BucketSnapshot) -> Baseline {
        Baseline::for_key(aggregator, snapshot.key(), self.config.baseline)
    }

    /// Classify a published snapshot, reusing its cached label when the
    /// bucket and the baseline are unchanged.
    pub fn classify_snapshot(&self, snapshot: &BucketSnapshot, baseline: &Baseline) -> Classification {
        let fingerprint = self.fingerprint(baseline);
        snapshot.classification(fingerprint, |bucket| {
            let label = classify(bucket, baseline, &self.config);
            debug!(
                bucket = %bucket.key,
                count = bucket.stats.total,
                baseline_avg = baseline.avg_count,
                %label,
                "Bucket classified"
            );
            Metrics::bucket_classified(label.as_str());
            label
        })
    }

    /// Baseline lookup plus cached classification.
    pub fn classify_in(&self, aggregator: &HourlyAggregator, snapshot: &BucketSnapshot) -> Classification {
        let baseline = self.baseline_for(aggregator, snapshot);
        self.classify_snapshot(snapshot, &baseline)
    }

    fn fingerprint(&self, baseline: &Baseline) -> u64 {
        let mut hasher = DefaultHasher::new();
        baseline.fingerprint().hash(&mut hasher);
        self.config.bottleneck_multiplier.to_bits().hash(&mut hasher);
        self.config.slow_threshold_secs.to_bits().hash(&mut hasher);
        self.config.error_rate_threshold.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}
