//! Terminal outcome of one transaction, as recorded into an hour bucket.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use txops_core::{
    Asset, OperationType, PaymentMethod, TransactionId, TransactionStatus,
    TransactionStatusChanged, UserId,
};

use crate::error::{AggregationError, AggregationResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub operation: OperationType,
    pub asset: Asset,
    pub status: TransactionStatus,
    pub amount_usd: Decimal,
    pub fee_usd: Decimal,
    pub processing_time_seconds: Option<i64>,
    /// Fraud policy verdict for this transaction.
    pub flagged: bool,
    pub manual_review: bool,
    /// Processing time exceeded the transaction timeout.
    pub slow: bool,
    pub failure_reason: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

impl TransactionOutcome {
    /// Build from a terminal fact. `timeout_seconds` decides `slow`.
    pub fn from_fact(
        fact: &TransactionStatusChanged,
        flagged: bool,
        timeout_seconds: i64,
    ) -> AggregationResult<Self> {
        if !fact.is_terminal() {
            return Err(AggregationError::NotTerminal {
                transaction_id: fact.transaction_id,
                status: fact.status,
            });
        }
        Ok(Self {
            transaction_id: fact.transaction_id,
            user_id: fact.user_id,
            operation: fact.operation,
            asset: fact.asset.clone(),
            status: fact.status,
            amount_usd: fact.amount_usd,
            fee_usd: fact.fee_usd,
            processing_time_seconds: fact.processing_time_seconds,
            flagged,
            manual_review: fact.manual_review,
            slow: fact
                .processing_time_seconds
                .is_some_and(|secs| secs > timeout_seconds),
            failure_reason: fact.failure_reason.clone(),
            payment_method: fact.payment_method,
        })
    }

    /// Processing time that counts toward latency statistics. Cancelled
    /// outcomes are counted but carry no latency.
    pub fn timed_seconds(&self) -> Option<i64> {
        match self.status {
            TransactionStatus::Successful | TransactionStatus::Failed => {
                self.processing_time_seconds
            }
            _ => None,
        }
    }
}
