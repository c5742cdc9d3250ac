//! State machine error types.

use thiserror::Error;
use txops_core::{CoreError, TransactionId, TransactionStatus, UserId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    /// Event failed its own consistency checks (negative amounts,
    /// completion before start, ...).
    #[error("Validation failed: {0}")]
    Validation(#[from] CoreError),

    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Terminal status {status} for {id} without completed_at")]
    MissingCompletion {
        id: TransactionId,
        status: TransactionStatus,
    },

    #[error("Transaction {id} belongs to {expected}, event carries {actual}")]
    UserMismatch {
        id: TransactionId,
        expected: UserId,
        actual: UserId,
    },
}

impl TransitionError {
    /// Re-delivery of the terminal status the transaction already has.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::InvalidTransition { from, to, .. } if from == to)
    }
}

pub type TransitionResult<T> = Result<T, TransitionError>;
