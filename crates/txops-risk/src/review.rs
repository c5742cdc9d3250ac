//! Review routing to the validation collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use txops_core::TransactionId;
use txops_telemetry::Metrics;

/// Why a transaction was sent for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    FraudFlagged,
    ManualReviewRequested,
    DailyLimitExceeded,
}

impl ReviewReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FraudFlagged => "fraud_flagged",
            Self::ManualReviewRequested => "manual_review_requested",
            Self::DailyLimitExceeded => "daily_limit_exceeded",
        }
    }
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub transaction_id: TransactionId,
    pub reason: ReviewReason,
    pub requested_at: DateTime<Utc>,
}

/// Validation collaborator.
///
/// Fire-and-forget: implementations must not block, and outcomes come back
/// later as ordinary lifecycle events.
#[cfg_attr(test, mockall::automock)]
pub trait ReviewSink: Send + Sync {
    fn submit_for_review(&self, transaction_id: TransactionId, reason: ReviewReason);
}

/// [`ReviewSink`] backed by a bounded channel drained by a dispatcher task.
///
/// A full channel drops the request with a warning rather than stalling the
/// fraud stage.
#[derive(Debug, Clone)]
pub struct ChannelReviewSink {
    tx: mpsc::Sender<ReviewRequest>,
}

impl ChannelReviewSink {
    pub fn new(tx: mpsc::Sender<ReviewRequest>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReviewRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl ReviewSink for ChannelReviewSink {
    fn submit_for_review(&self, transaction_id: TransactionId, reason: ReviewReason) {
        let request = ReviewRequest {
            transaction_id,
            reason,
            requested_at: Utc::now(),
        };
        match self.tx.try_send(request) {
            Ok(()) => Metrics::review_requested(reason.as_str()),
            Err(TrySendError::Full(request)) => {
                Metrics::review_dropped();
                warn!(
                    id = %request.transaction_id,
                    reason = %request.reason,
                    "Review queue full, request dropped"
                );
            }
            Err(TrySendError::Closed(request)) => {
                Metrics::review_dropped();
                warn!(
                    id = %request.transaction_id,
                    reason = %request.reason,
                    "Review dispatcher stopped, request dropped"
                );
            }
        }
    }
}
