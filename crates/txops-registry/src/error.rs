//! Registry error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read threshold file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Threshold file parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Threshold {key} is missing")]
    Missing { key: String },

    #[error("Threshold {key} is not numeric: {value}")]
    NonNumeric { key: String, value: String },

    #[error("Threshold {key}={value} out of range [{min}, {max}]")]
    OutOfRange {
        key: String,
        value: String,
        min: String,
        max: String,
    },
}

pub type RegistryResult<T> = Result<T, ConfigError>;
