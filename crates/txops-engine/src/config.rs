//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use txops_detector::ClassifierConfig;
use txops_query::QueryConfig;

use crate::error::{EngineError, EngineResult};

/// Ingest workers and their queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Worker tasks; facts are sharded to them by user id.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Bounded queue per worker. A full queue rejects new events.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Threshold registry source and reload cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Flat TOML table of thresholds. Built-in defaults when unset.
    #[serde(default)]
    pub threshold_file: Option<String>,
    /// Hot reload interval in seconds (0 = disabled).
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
}

fn default_reload_interval_secs() -> u64 {
    30
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            threshold_file: None,
            reload_interval_secs: default_reload_interval_secs(),
        }
    }
}

/// Hour bucket retention and housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Hours of buckets kept in memory (default 90 days).
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
    /// Retention prune interval in seconds.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Timeout sweep interval in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_retention_hours() -> u32 {
    txops_aggregator::hourly::DEFAULT_RETENTION_HOURS
}

fn default_prune_interval_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            prune_interval_secs: default_prune_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Durable fact log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_persistence_enabled")]
    pub enabled: bool,
    /// Directory of the daily `facts_*.jsonl` files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Records buffered before a flush.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Periodic flush interval in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Writer task queue capacity.
    #[serde(default = "default_writer_queue_capacity")]
    pub queue_capacity: usize,
    /// Rebuild state from the log at startup.
    #[serde(default = "default_replay_on_start")]
    pub replay_on_start: bool,
}

fn default_persistence_enabled() -> bool {
    true
}

fn default_data_dir() -> String {
    "./data/facts".to_string()
}

fn default_buffer_size() -> usize {
    100
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_writer_queue_capacity() -> usize {
    4096
}

fn default_replay_on_start() -> bool {
    true
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: default_persistence_enabled(),
            data_dir: default_data_dir(),
            buffer_size: default_buffer_size(),
            flush_interval_ms: default_flush_interval_ms(),
            queue_capacity: default_writer_queue_capacity(),
            replay_on_start: default_replay_on_start(),
        }
    }
}

/// Review dispatch to the validation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Pending review requests; beyond this new requests are dropped.
    #[serde(default = "default_review_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_review_queue_capacity() -> usize {
    1024
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_review_queue_capacity(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Telemetry summary log interval in seconds.
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,
}

fn default_summary_interval_secs() -> u64 {
    3600
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            summary_interval_secs: default_summary_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> EngineResult<()> {
        if self.ingest.workers == 0 {
            return Err(EngineError::Config("ingest.workers must be positive".to_string()));
        }
        if self.ingest.queue_capacity == 0 {
            return Err(EngineError::Config(
                "ingest.queue_capacity must be positive".to_string(),
            ));
        }
        if self.aggregator.retention_hours == 0 {
            return Err(EngineError::Config(
                "aggregator.retention_hours must be positive".to_string(),
            ));
        }
        if self.persistence.buffer_size == 0 {
            return Err(EngineError::Config(
                "persistence.buffer_size must be positive".to_string(),
            ));
        }
        self.classifier
            .validate()
            .map_err(|e| EngineError::Config(format!("classifier: {e}")))?;
        self.query
            .validate()
            .map_err(|e| EngineError::Config(format!("query: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.ingest.workers, 4);
        assert_eq!(config.aggregator.retention_hours, 2160);
        assert!(config.persistence.replay_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [ingest]
            workers = 2

            [classifier]
            slow_threshold_secs = 120.0

            [classifier.baseline]
            kind = "same_hour_trailing_days"
            days = 7

            [query]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.ingest.workers, 2);
        assert_eq!(config.ingest.queue_capacity, 1024);
        assert_eq!(config.classifier.slow_threshold_secs, 120.0);
        assert_eq!(config.query.port, 9000);
        assert!(config.registry.threshold_file.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_toml_str("[ingest]\nworkers = 0\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));

        let err = AppConfig::from_toml_str("[classifier]\nbottleneck_multiplier = -1.0\n").unwrap_err();
        assert!(err.to_string().contains("classifier"));
    }

    #[test]
    fn test_shipped_default_config_parses() {
        let config = AppConfig::from_toml_str(include_str!("../../../config/default.toml")).unwrap();
        assert_eq!(
            config.registry.threshold_file.as_deref(),
            Some("config/thresholds.toml")
        );
        assert_eq!(config.query.port, 8080);
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = toml::to_string(&AppConfig::default()).unwrap();
        assert!(toml_str.contains("[ingest]"));
        assert!(toml_str.contains("retention_hours"));
    }
}
