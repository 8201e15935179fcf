//! ClickHouse configuration.

use serde::{Deserialize, Serialize};

/// ClickHouse client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// ClickHouse HTTP URL
    pub url: String,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Username (optional)
    pub username: Option<String>,
    /// Password (optional)
    pub password: Option<String>,
    /// Server-side execution limit for migration statements, 0 = unlimited
    #[serde(default)]
    pub max_execution_time_secs: u64,
    /// Interval between `system.processes` progress polls
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
}

fn default_database() -> String {
    "default".to_string()
}

fn default_progress_interval_secs() -> u64 {
    5
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: default_database(),
            username: None,
            password: None,
            max_execution_time_secs: 0,
            progress_interval_secs: default_progress_interval_secs(),
        }
    }
}
