//! Fraud scoring stage for txops.
//!
//! - Accepts an upstream fraud score or computes one locally, in `[0, 100]`
//! - Applies the flag policy (`score >= fraud_threshold` unless overridden)
//! - Tracks per-(user, day) spend against the tier daily limit
//! - Checks fees against the configured commission rates
//! - Routes review requests to the validation collaborator (fire-and-forget)

pub mod commission;
pub mod daily_limit;
pub mod error;
pub mod review;
pub mod scoring;
pub mod stage;

pub use commission::{check_fee, FeeMismatch, FEE_TOLERANCE};
pub use daily_limit::{DailyLimitBreach, DailyLimitTracker};
pub use error::{RiskError, RiskResult};
pub use review::{ChannelReviewSink, ReviewReason, ReviewRequest, ReviewSink};
pub use scoring::{
    assess, local_score, validate_event_score, validate_score, FraudAssessment, ScoreSource,
};
pub use stage::FraudStage;
