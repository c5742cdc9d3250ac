//! Risk error types.

use thiserror::Error;
use txops_core::TransactionId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("Fraud score {score} for {id} outside [0, 100]")]
    InvalidScoreRange { id: TransactionId, score: f64 },
}

pub type RiskResult<T> = Result<T, RiskError>;
