//! Durable fact log for txops.
//!
//! Status-change facts are appended to daily JSON Lines files
//! (`facts_YYYY-MM-DD.jsonl`) by a dedicated writer task, and replayed at
//! startup to rebuild in-memory state.
//!
//! Delivery is at-least-once: a failed flush keeps its records buffered and
//! retries them, so replay must tolerate repeated facts.

pub mod error;
pub mod record;
pub mod replay;
pub mod task;
pub mod writer;

pub use error::{PersistenceError, PersistenceResult};
pub use record::LogRecord;
pub use replay::{replay, ReplayReport};
pub use task::{spawn_log_writer, LogHandle};
pub use writer::JsonLinesLog;
