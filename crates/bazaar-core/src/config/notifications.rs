//! Notification sync settings.

use serde::{Deserialize, Serialize};

/// Notification store and sync driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Interval between full reconciliation fetches while live.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_seconds: u64,
    /// Buffer size of the in-process change event channels.
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
    /// Buffer size of the alert broadcast channel.
    #[serde(default = "default_alert_buffer")]
    pub alert_buffer_size: usize,
    /// Reconnect backoff for the change stream and failed loads.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_seconds: default_reconcile_interval(),
            event_buffer_size: default_event_buffer(),
            alert_buffer_size: default_alert_buffer(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Upper bound on the delay in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Growth factor applied after each failed attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_reconcile_interval() -> u64 {
    300
}

fn default_event_buffer() -> usize {
    256
}

fn default_alert_buffer() -> usize {
    64
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}
