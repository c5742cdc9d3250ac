//! Core domain types for the txops transaction metrics engine.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `TransactionEvent`: Validated ingest payload
//! - `TransactionStatusChanged`: Fact emitted on every lifecycle transition
//! - `BucketKey`: (date, hour) key of the hourly aggregates
//! - Identifier and enum types (`TransactionId`, `UserId`, `Asset`, `TransactionStatus`, ...)

pub mod bucket;
pub mod error;
pub mod event;
pub mod fact;
pub mod types;

pub use bucket::BucketKey;
pub use error::{CoreError, Result};
pub use event::TransactionEvent;
pub use fact::TransactionStatusChanged;
pub use types::{
    Asset, Classification, OperationType, PaymentMethod, TransactionId, TransactionStatus, UserId,
    VerificationTier,
};
