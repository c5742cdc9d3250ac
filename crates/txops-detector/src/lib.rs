//! Bottleneck and anomaly classification for txops.
//!
//! Labels each hour bucket as `Bottleneck`, `Slow`, `HighErrorRate` or
//! `Normal` against a baseline built from prior buckets, and compares peak
//! (18:00-23:59) against off-peak hours.

pub mod baseline;
pub mod classifier;
pub mod config;
pub mod error;
pub mod peak;

pub use baseline::{Baseline, BaselineWindow};
pub use classifier::{classify, BottleneckClassifier};
pub use config::ClassifierConfig;
pub use error::{DetectorError, DetectorResult};
pub use peak::{compare_peak, PeakComparison, PeriodStats};
