//! Classifier configuration.

use serde::{Deserialize, Serialize};

use crate::baseline::BaselineWindow;

/// Thresholds for bucket classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Bucket count above `multiplier × baseline.avg_count` is a bottleneck.
    #[serde(default = "default_bottleneck_multiplier")]
    pub bottleneck_multiplier: f64,
    /// Mean processing time (seconds) above which a bucket is slow.
    #[serde(default = "default_slow_threshold_secs")]
    pub slow_threshold_secs: f64,
    /// Failed/total ratio above which a bucket has a high error rate.
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,
    /// Which prior buckets form the baseline.
    #[serde(default)]
    pub baseline: BaselineWindow,
}

fn default_bottleneck_multiplier() -> f64 {
    2.0
}

fn default_slow_threshold_secs() -> f64 {
    90.0
}

fn default_error_rate_threshold() -> f64 {
    0.10
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            bottleneck_multiplier: default_bottleneck_multiplier(),
            slow_threshold_secs: default_slow_threshold_secs(),
            error_rate_threshold: default_error_rate_threshold(),
            baseline: BaselineWindow::default(),
        }
    }
}

impl ClassifierConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.bottleneck_multiplier.is_finite() && self.bottleneck_multiplier > 0.0) {
            return Err(format!(
                "bottleneck_multiplier ({}) must be positive",
                self.bottleneck_multiplier
            ));
        }
        if !(self.slow_threshold_secs.is_finite() && self.slow_threshold_secs >= 0.0) {
            return Err(format!(
                "slow_threshold_secs ({}) must be non-negative",
                self.slow_threshold_secs
            ));
        }
        if !(0.0..=1.0).contains(&self.error_rate_threshold) {
            return Err(format!(
                "error_rate_threshold ({}) must be within [0, 1]",
                self.error_rate_threshold
            ));
        }
        self.baseline.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClassifierConfig::default();
        assert_eq!(config.bottleneck_multiplier, 2.0);
        assert_eq!(config.slow_threshold_secs, 90.0);
        assert_eq!(config.error_rate_threshold, 0.10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ClassifierConfig = toml::from_str(
            r#"
            slow_threshold_secs = 60.0
            baseline = { kind = "same_hour_trailing_days", days = 7 }
            "#,
        )
        .unwrap();
        assert_eq!(config.slow_threshold_secs, 60.0);
        assert_eq!(config.bottleneck_multiplier, 2.0);
        assert_eq!(config.baseline, BaselineWindow::SameHourTrailingDays { days: 7 });
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ClassifierConfig {
            error_rate_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClassifierConfig {
            bottleneck_multiplier: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClassifierConfig {
            baseline: BaselineWindow::TrailingHours { hours: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
