//! Managed backend (REST + realtime) connection settings.

use serde::{Deserialize, Serialize};

/// Connection settings for the hosted database and its change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the REST endpoint exposing the tables.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// WebSocket URL of the realtime change feed.
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,
    /// Public API key sent as the `apikey` header.
    #[serde(default)]
    pub api_key: String,
    /// Bearer token of the signed-in user. Falls back to the API key.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Timeout for a single REST request in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl BackendConfig {
    /// Token to send in the `Authorization` header.
    pub fn bearer_token(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            realtime_url: default_realtime_url(),
            api_key: String::new(),
            access_token: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_rest_url() -> String {
    "http://localhost:54321/rest/v1".to_string()
}

fn default_realtime_url() -> String {
    "ws://localhost:54321/realtime/v1/changes".to_string()
}

fn default_request_timeout() -> u64 {
    15
}
