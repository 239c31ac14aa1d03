//! Monitor configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the periodic monitor loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Polling interval in seconds
    #[serde(rename = "interval-secs", default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Alerts are evaluated only every this many ticks
    #[serde(rename = "alert-frequency", default = "default_alert_frequency")]
    pub alert_frequency: u64,

    /// Fullness percentage at or above which a sensor alerts
    #[serde(rename = "fullness-threshold", default = "default_fullness_threshold")]
    pub fullness_threshold: f64,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_alert_frequency() -> u64 {
    5
}

fn default_fullness_threshold() -> f64 {
    80.0
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            alert_frequency: 5,
            fullness_threshold: 80.0,
        }
    }
}

impl MonitorConfig {
    /// Get the polling interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
