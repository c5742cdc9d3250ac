//! Aggregation error types.

use thiserror::Error;
use txops_core::{TransactionId, TransactionStatus, UserId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("Negative amount {amount} for {transaction_id} of {user_id}")]
    NegativeAmount {
        user_id: UserId,
        transaction_id: TransactionId,
        amount: String,
    },

    #[error("Outcome for {transaction_id} is not terminal: {status}")]
    NotTerminal {
        transaction_id: TransactionId,
        status: TransactionStatus,
    },
}

pub type AggregationResult<T> = Result<T, AggregationError>;
