//! Query server configuration.

use serde::{Deserialize, Serialize};

/// Query HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Enable the HTTP server.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Window used when a request does not name one.
    #[serde(default = "default_window_minutes")]
    pub default_window_minutes: i64,
    /// Largest window a request may ask for.
    #[serde(default = "default_max_window_hours")]
    pub max_window_hours: i64,
    /// Rows returned by `/api/assets/top` without a `limit`.
    #[serde(default = "default_top_assets_limit")]
    pub top_assets_limit: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

fn default_window_minutes() -> i64 {
    60
}

fn default_max_window_hours() -> i64 {
    24 * 90
}

fn default_top_assets_limit() -> usize {
    10
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
            default_window_minutes: default_window_minutes(),
            max_window_hours: default_max_window_hours(),
            top_assets_limit: default_top_assets_limit(),
        }
    }
}

impl QueryConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_window_minutes <= 0 {
            return Err("default_window_minutes must be positive".to_string());
        }
        if self.max_window_hours <= 0 {
            return Err("max_window_hours must be positive".to_string());
        }
        if self.default_window_minutes > self.max_window_hours * 60 {
            return Err(format!(
                "default_window_minutes ({}) exceeds max_window_hours ({})",
                self.default_window_minutes, self.max_window_hours
            ));
        }
        if self.top_assets_limit == 0 {
            return Err("top_assets_limit must be positive".to_string());
        }
        Ok(())
    }
}
