//! Currency conversion settings.

use serde::{Deserialize, Serialize};

/// Rate provider and rate cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Source currency code.
    #[serde(default = "default_base")]
    pub base: String,
    /// Target currency code.
    #[serde(default = "default_target")]
    pub target: String,
    /// Endpoint returning the conversion rate as JSON.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
    /// JSON pointer locating the rate inside the provider response.
    #[serde(default = "default_rate_pointer")]
    pub rate_pointer: String,
    /// How long a fetched rate is served without refetching.
    #[serde(default = "default_fresh_for")]
    pub fresh_for_seconds: u64,
    /// How long the persisted entry is retained as a fallback.
    #[serde(default = "default_persist_ttl")]
    pub persist_ttl_seconds: u64,
    /// Timeout for the provider request in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl CurrencyConfig {
    /// Currency pair label, e.g. `USD-BRL`.
    pub fn pair(&self) -> String {
        format!("{}-{}", self.base, self.target)
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
            target: default_target(),
            provider_url: default_provider_url(),
            rate_pointer: default_rate_pointer(),
            fresh_for_seconds: default_fresh_for(),
            persist_ttl_seconds: default_persist_ttl(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_base() -> String {
    "USD".to_string()
}

fn default_target() -> String {
    "BRL".to_string()
}

fn default_provider_url() -> String {
    "https://economia.awesomeapi.com.br/json/last/USD-BRL".to_string()
}

fn default_rate_pointer() -> String {
    "/USDBRL/bid".to_string()
}

fn default_fresh_for() -> u64 {
    3600
}

fn default_persist_ttl() -> u64 {
    30 * 24 * 3600
}

fn default_request_timeout() -> u64 {
    10
}
