//! Transaction lifecycle event (ingest payload).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{
    Asset, OperationType, PaymentMethod, TransactionId, TransactionStatus, UserId,
    VerificationTier,
};

/// Immutable input describing a transaction at one point of its lifecycle.
///
/// Produced by upstream processing systems and consumed once by the state
/// machine. Money fields are USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub id: TransactionId,
    pub user_id: UserId,
    pub operation: OperationType,
    pub asset: Asset,
    /// Destination asset for swaps.
    #[serde(default)]
    pub target_asset: Option<Asset>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub fee: Decimal,
    /// Principal plus fee.
    pub total_amount: Decimal,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
    /// Upstream fraud score in [0, 100]; computed locally when absent.
    #[serde(default)]
    pub fraud_score: Option<f64>,
    /// Explicit analyst decision that overrides the threshold policy.
    #[serde(default)]
    pub fraud_override: Option<bool>,
    #[serde(default)]
    pub manual_review: bool,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub tier: Option<VerificationTier>,
}

impl TransactionEvent {
    /// Create a pending event with zero amounts.
    pub fn new(
        id: TransactionId,
        user_id: UserId,
        operation: OperationType,
        asset: impl Into<Asset>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            operation,
            asset: asset.into(),
            target_asset: None,
            quantity: Decimal::ZERO,
            unit_price: Decimal::ZERO,
            fee: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            started_at,
            completed_at: None,
            status: TransactionStatus::Pending,
            fraud_score: None,
            fraud_override: None,
            manual_review: false,
            failure_reason: None,
            payment_method: None,
            tier: None,
        }
    }

    /// Set quantity, unit price and fee; total is derived.
    #[must_use]
    pub fn with_amounts(mut self, quantity: Decimal, unit_price: Decimal, fee: Decimal) -> Self {
        self.quantity = quantity;
        self.unit_price = unit_price;
        self.fee = fee;
        self.total_amount = quantity * unit_price + fee;
        self
    }

    #[must_use]
    pub fn with_status(
        mut self,
        status: TransactionStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.status = status;
        self.completed_at = completed_at;
        self
    }

    #[must_use]
    pub fn with_fraud_score(mut self, score: f64) -> Self {
        self.fraud_score = Some(score);
        self
    }

    #[must_use]
    pub fn with_fraud_override(mut self, flagged: bool) -> Self {
        self.fraud_override = Some(flagged);
        self
    }

    #[must_use]
    pub fn with_manual_review(mut self, manual_review: bool) -> Self {
        self.manual_review = manual_review;
        self
    }

    #[must_use]
    pub fn with_tier(mut self, tier: VerificationTier) -> Self {
        self.tier = Some(tier);
        self
    }

    #[must_use]
    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    #[must_use]
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_target_asset(mut self, asset: impl Into<Asset>) -> Self {
        self.target_asset = Some(asset.into());
        self
    }

    /// Principal in USD (total minus fee); this is what volume aggregates sum.
    pub fn amount_usd(&self) -> Decimal {
        self.total_amount - self.fee
    }

    /// Check the event's internal consistency.
    ///
    /// Rejects negative money/quantity fields, a fee larger than the total and
    /// a completion timestamp before the start timestamp.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("quantity", self.quantity),
            ("unit_price", self.unit_price),
            ("fee", self.fee),
            ("total_amount", self.total_amount),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(CoreError::NegativeAmount {
                    id: self.id,
                    field,
                    value: value.to_string(),
                });
            }
        }

        if self.fee > self.total_amount {
            return Err(CoreError::FeeExceedsTotal {
                id: self.id,
                fee: self.fee.to_string(),
                total: self.total_amount.to_string(),
            });
        }

        if let Some(completed_at) = self.completed_at {
            if completed_at < self.started_at {
                return Err(CoreError::TimestampOrderViolation {
                    id: self.id,
                    started_at: self.started_at,
                    completed_at,
                });
            }
        }

        Ok(())
    }
}
