//! Status-change fact emitted by the state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bucket::BucketKey;
use crate::event::TransactionEvent;
use crate::types::{
    Asset, OperationType, PaymentMethod, TransactionId, TransactionStatus, UserId,
    VerificationTier,
};

/// A transaction moved from `previous` to `status`.
///
/// Carries everything the aggregators, the fraud stage and log replay need, so
/// consumers never look back at raw events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStatusChanged {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub operation: OperationType,
    pub asset: Asset,
    #[serde(default)]
    pub target_asset: Option<Asset>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount_usd: Decimal,
    pub fee_usd: Decimal,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// `None` when this fact created the record.
    pub previous: Option<TransactionStatus>,
    pub status: TransactionStatus,
    /// Set only when `status` is terminal.
    pub processing_time_seconds: Option<i64>,
    pub fraud_score: Option<f64>,
    pub fraud_override: Option<bool>,
    pub manual_review: bool,
    pub failure_reason: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub tier: Option<VerificationTier>,
}

impl TransactionStatusChanged {
    /// Build a fact from the event that caused the transition.
    pub fn from_event(
        event: &TransactionEvent,
        previous: Option<TransactionStatus>,
        processing_time_seconds: Option<i64>,
    ) -> Self {
        Self {
            transaction_id: event.id,
            user_id: event.user_id,
            operation: event.operation,
            asset: event.asset.clone(),
            target_asset: event.target_asset.clone(),
            quantity: event.quantity,
            unit_price: event.unit_price,
            amount_usd: event.amount_usd(),
            fee_usd: event.fee,
            started_at: event.started_at,
            completed_at: event.completed_at,
            previous,
            status: event.status,
            processing_time_seconds,
            fraud_score: event.fraud_score,
            fraud_override: event.fraud_override,
            manual_review: event.manual_review,
            failure_reason: event.failure_reason.clone(),
            payment_method: event.payment_method,
            tier: event.tier,
        }
    }

    /// True when this fact is the first transition into `Successful`.
    #[must_use]
    pub fn is_first_success(&self) -> bool {
        self.status == TransactionStatus::Successful
            && self.previous != Some(TransactionStatus::Successful)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Rebuild the event that produced this fact (used on log replay).
    pub fn to_event(&self) -> TransactionEvent {
        TransactionEvent {
            id: self.transaction_id,
            user_id: self.user_id,
            operation: self.operation,
            asset: self.asset.clone(),
            target_asset: self.target_asset.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            fee: self.fee_usd,
            total_amount: self.amount_usd + self.fee_usd,
            started_at: self.started_at,
            completed_at: self.completed_at,
            status: self.status,
            fraud_score: self.fraud_score,
            fraud_override: self.fraud_override,
            manual_review: self.manual_review,
            failure_reason: self.failure_reason.clone(),
            payment_method: self.payment_method,
            tier: self.tier,
        }
    }

    /// Hour bucket this transaction belongs to (by start time).
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey::from_timestamp(self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fact_from_event() {
        let started = Utc.with_ymd_and_hms(2024, 7, 1, 23, 59, 50).unwrap();
        let completed = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 40).unwrap();
        let event = TransactionEvent::new(
            TransactionId::new(9),
            UserId::new(1),
            OperationType::Sell,
            "ETH",
            started,
        )
        .with_amounts(dec!(2), dec!(2500), dec!(25))
        .with_status(TransactionStatus::Successful, Some(completed));

        let fact =
            TransactionStatusChanged::from_event(&event, Some(TransactionStatus::Processing), Some(50));

        assert!(fact.is_first_success());
        assert!(fact.is_terminal());
        assert_eq!(fact.amount_usd, dec!(5000));
        assert_eq!(fact.fee_usd, dec!(25));
        // Late completion still lands in the start hour.
        assert_eq!(fact.bucket_key().hour(), 23);
        assert_eq!(fact.to_event(), event);
    }
}
