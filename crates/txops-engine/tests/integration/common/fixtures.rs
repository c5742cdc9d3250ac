//! Shared builders for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::path::Path;

use txops_core::{Asset, OperationType, TransactionEvent, TransactionId, TransactionStatus, UserId};
use txops_engine::AppConfig;
use txops_registry::{ConfigKey, ConfigSnapshot};

/// In-memory config: no fact log, no HTTP server.
pub fn memory_config(workers: usize, queue_capacity: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.ingest.workers = workers;
    config.ingest.queue_capacity = queue_capacity;
    config.persistence.enabled = false;
    config.query.enabled = false;
    config
}

/// Config logging facts under `dir`.
pub fn persistent_config(dir: &Path) -> AppConfig {
    let mut config = memory_config(2, 64);
    config.persistence.enabled = true;
    config.persistence.data_dir = dir.display().to_string();
    config.persistence.buffer_size = 1;
    config
}

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, h, m, s).unwrap()
}

/// Purchase of 1 BTC at `price` with a 0.5% fee, started at 10:00:00.
pub fn purchase(id: u64, user: u64, price: Decimal) -> TransactionEvent {
    TransactionEvent::new(
        TransactionId::new(id),
        UserId::new(user),
        OperationType::Purchase,
        Asset::new("BTC"),
        at(10, 0, 0),
    )
    .with_amounts(Decimal::ONE, price, price * Decimal::new(5, 3))
}

pub fn completed(event: TransactionEvent, completed_at: DateTime<Utc>) -> TransactionEvent {
    event.with_status(TransactionStatus::Successful, Some(completed_at))
}

/// Complete threshold file: built-in values with `fraud_threshold` replaced.
pub fn thresholds_toml(fraud_threshold: Decimal) -> String {
    let mut snapshot = ConfigSnapshot::defaults(0);
    snapshot
        .set(ConfigKey::FraudThreshold, fraud_threshold)
        .unwrap();
    snapshot.to_toml_string()
}
