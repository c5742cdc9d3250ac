//! Query error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),
}

pub type QueryResult<T> = Result<T, QueryError>;
