//! Error types for txops-core.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::TransactionId;

/// Validation errors raised while constructing or checking domain values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Negative {field} on transaction {id}: {value}")]
    NegativeAmount {
        id: TransactionId,
        field: &'static str,
        value: String,
    },

    #[error("Fee {fee} exceeds total amount {total} on transaction {id}")]
    FeeExceedsTotal {
        id: TransactionId,
        fee: String,
        total: String,
    },

    #[error("Transaction {id} completed at {completed_at} before it started at {started_at}")]
    TimestampOrderViolation {
        id: TransactionId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
