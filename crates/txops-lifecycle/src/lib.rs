//! Transaction lifecycle state machine for txops.
//!
//! Validates lifecycle events, applies `pending -> processing -> terminal`
//! transitions, derives processing time and emits a
//! [`TransactionStatusChanged`](txops_core::TransactionStatusChanged) fact per
//! accepted transition.
//!
//! # Key Components
//!
//! - [`TransactionStateMachine`]: Per-transaction records keyed by id
//! - [`TransactionRecord`]: Mutable projection of one transaction
//! - [`Transition`]: Result of applying one event
//! - [`TIMEOUT_FAILURE_REASON`]: Failure reason on swept transactions

pub mod error;
pub mod machine;
pub mod record;

pub use error::{TransitionError, TransitionResult};
pub use machine::{Transition, TransactionStateMachine, TIMEOUT_FAILURE_REASON};
pub use record::TransactionRecord;
