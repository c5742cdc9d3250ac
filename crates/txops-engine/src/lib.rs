//! txops engine.
//!
//! Service that orchestrates all components:
//! - Bounded, sharded ingest in front of the transaction state machine
//! - Fan-out of status-change facts to the aggregators and the fraud stage
//! - Durable fact log with replay at startup
//! - Threshold hot reload, timeout sweep and retention pruning
//! - Query HTTP API

pub mod app;
pub mod config;
pub mod error;
pub mod ingest;
pub mod stages;

pub use app::{Application, ReloadOutcome};
pub use config::AppConfig;
pub use error::{EngineError, EngineResult, IngestError, IngestResult};
pub use ingest::IngestPipeline;
pub use stages::FanOut;
