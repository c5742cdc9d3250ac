//! Incremental aggregation for txops.
//!
//! Maintains per-(date, hour) operational buckets and per-user lifetime
//! statistics from status-change facts, without re-scanning history.
//! Writers take a per-entity mutex; readers load copy-on-write snapshots and
//! never block writers.

pub mod error;
pub mod hourly;
pub mod outcome;
pub mod sketch;
pub mod user_stats;

pub use error::{AggregationError, AggregationResult};
pub use hourly::{
    BucketSnapshot, DerivedRates, HourBucket, HourlyAggregator, MeanTime, OutcomeStats,
    PaymentMethodStats,
};
pub use outcome::TransactionOutcome;
pub use sketch::{Percentiles, QuantileSketch};
pub use user_stats::{UserStats, UserStatsAggregator};
