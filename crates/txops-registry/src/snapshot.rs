//! Immutable, versioned threshold snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

use txops_core::{OperationType, VerificationTier};

use crate::error::{ConfigError, RegistryResult};
use crate::key::ConfigKey;

/// One consistent version of every recognized threshold.
///
/// Every key is always present. A source that omits a key is rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSnapshot {
    pub version: u64,
    pub loaded_at: DateTime<Utc>,
    values: BTreeMap<ConfigKey, Decimal>,
}

impl ConfigSnapshot {
    /// Snapshot holding only defaults.
    pub fn defaults(version: u64) -> Self {
        let values = ConfigKey::ALL
            .iter()
            .map(|key| (*key, key.default_value()))
            .collect();
        Self {
            version,
            loaded_at: Utc::now(),
            values,
        }
    }

    /// Parse a flat TOML table of `key = value` pairs.
    ///
    /// Values may be integers, floats or decimal strings. All recognized keys
    /// are required; unknown keys are logged and ignored.
    pub fn from_toml_str(content: &str, version: u64) -> RegistryResult<Self> {
        let table: toml::Table = content.parse()?;
        let mut snapshot = Self {
            version,
            loaded_at: Utc::now(),
            values: BTreeMap::new(),
        };

        for (name, raw) in &table {
            let Ok(key) = name.parse::<ConfigKey>() else {
                warn!(key = %name, "Ignoring unknown threshold key");
                continue;
            };
            let value = parse_value(key, raw)?;
            snapshot.set(key, value)?;
        }

        if let Some(key) = ConfigKey::ALL
            .iter()
            .find(|key| !snapshot.values.contains_key(*key))
        {
            return Err(ConfigError::Missing {
                key: key.to_string(),
            });
        }
        Ok(snapshot)
    }

    /// Render as the flat table [`from_toml_str`](Self::from_toml_str) reads.
    pub fn to_toml_string(&self) -> String {
        self.values
            .iter()
            .map(|(key, value)| format!("{key} = \"{value}\"\n"))
            .collect()
    }

    /// Set a value, enforcing the key's range.
    pub fn set(&mut self, key: ConfigKey, value: Decimal) -> RegistryResult<()> {
        let (min, max) = key.range();
        if value < min || value > max {
            return Err(ConfigError::OutOfRange {
                key: key.to_string(),
                value: value.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        self.values.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: ConfigKey) -> Decimal {
        self.values
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_value())
    }

    pub fn values(&self) -> &BTreeMap<ConfigKey, Decimal> {
        &self.values
    }

    // ========================================================================
    // Typed accessors
    // ========================================================================

    pub fn transaction_timeout_seconds(&self) -> i64 {
        self.get(ConfigKey::TransactionTimeoutSeconds)
            .trunc()
            .to_i64()
            .unwrap_or(300)
    }

    pub fn fraud_threshold(&self) -> f64 {
        self.get(ConfigKey::FraudThreshold).to_f64().unwrap_or(75.0)
    }

    pub fn commission_rate(&self, operation: OperationType) -> Decimal {
        self.get(ConfigKey::commission_for(operation))
    }

    pub fn daily_limit(&self, tier: VerificationTier) -> Decimal {
        self.get(ConfigKey::daily_limit_for(tier))
    }
}

fn parse_value(key: ConfigKey, raw: &toml::Value) -> RegistryResult<Decimal> {
    let non_numeric = || ConfigError::NonNumeric {
        key: key.to_string(),
        value: raw.to_string(),
    };
    match raw {
        toml::Value::Integer(i) => Ok(Decimal::from(*i)),
        toml::Value::Float(f) => Decimal::try_from(*f).map_err(|_| non_numeric()),
        toml::Value::String(s) => Decimal::from_str(s.trim()).map_err(|_| non_numeric()),
        _ => Err(non_numeric()),
    }
}
