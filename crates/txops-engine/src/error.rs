//! Engine error types.

use thiserror::Error;
use txops_lifecycle::TransitionError;
use txops_risk::RiskError;

/// Rejection of a submitted event. Nothing was applied when this is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("Validation failed: {0}")]
    Validation(#[from] TransitionError),

    #[error("{0}")]
    InvalidScore(#[from] RiskError),

    /// Worker queue full. Retry later.
    #[error("Ingest queue {worker} at capacity ({capacity})")]
    Capacity { worker: usize, capacity: usize },

    #[error("Ingest pipeline stopped")]
    Stopped,
}

impl IngestError {
    /// Metric label for the rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidScore(_) => "invalid_score",
            Self::Capacity { .. } => "capacity",
            Self::Stopped => "stopped",
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Threshold registry error: {0}")]
    Registry(#[from] txops_registry::ConfigError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Detector error: {0}")]
    Detector(#[from] txops_detector::DetectorError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] txops_persistence::PersistenceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] txops_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
