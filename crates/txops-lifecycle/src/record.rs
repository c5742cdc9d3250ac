//! Per-transaction projection owned by the state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;

use txops_core::{TransactionEvent, TransactionId, TransactionStatus, UserId};

/// Current state of one transaction.
///
/// `event` is the merged view of every accepted event: later events override
/// status and completion, while optional attributes (fraud score, tier,
/// payment method, ...) are carried forward when a later event omits them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub event: TransactionEvent,
    /// Whole seconds from start to completion. Set exactly once, on the
    /// first transition into a terminal status.
    pub processing_time_seconds: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub(crate) fn new(event: TransactionEvent, processing_time_seconds: Option<i64>) -> Self {
        Self {
            event,
            processing_time_seconds,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.event.id
    }

    pub fn user_id(&self) -> UserId {
        self.event.user_id
    }

    pub fn status(&self) -> TransactionStatus {
        self.event.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.event.started_at
    }

    pub fn is_terminal(&self) -> bool {
        self.event.status.is_terminal()
    }

    /// Merge a later event into the stored view.
    ///
    /// Identity and start time never change after creation.
    pub(crate) fn merge(&self, next: &TransactionEvent) -> TransactionEvent {
        let prev = &self.event;
        TransactionEvent {
            id: prev.id,
            user_id: prev.user_id,
            operation: prev.operation,
            asset: prev.asset.clone(),
            target_asset: next.target_asset.clone().or_else(|| prev.target_asset.clone()),
            quantity: next.quantity,
            unit_price: next.unit_price,
            fee: next.fee,
            total_amount: next.total_amount,
            started_at: prev.started_at,
            completed_at: next.completed_at,
            status: next.status,
            fraud_score: next.fraud_score.or(prev.fraud_score),
            fraud_override: next.fraud_override.or(prev.fraud_override),
            manual_review: next.manual_review || prev.manual_review,
            failure_reason: next
                .failure_reason
                .clone()
                .or_else(|| prev.failure_reason.clone()),
            payment_method: next.payment_method.or(prev.payment_method),
            tier: next.tier.or(prev.tier),
        }
    }
}

/// Whole seconds between start and completion, floored.
pub(crate) fn processing_time(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> i64 {
    (completed_at - started_at).num_milliseconds().div_euclid(1000)
}
