//! Prometheus metrics and structured logging for txops.
//!
//! - Prometheus metrics for ingest, fan-out stages, fraud reviews, config
//!   reloads and bucket classification
//! - Structured logging with tracing (JSON in production)
//! - Periodic summary output of the key counters

pub mod error;
pub mod logging;
pub mod metrics;
pub mod summary;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{gather_text, Metrics};
pub use summary::{SummaryReporter, TelemetrySummary};
