//! Rate sources.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use bazaar_core::config::currency::CurrencyConfig;
use bazaar_core::error::{AppError, ErrorKind};
use bazaar_core::result::AppResult;

/// Something that can produce the current conversion factor.
#[async_trait]
pub trait RateProvider: Send + Sync + std::fmt::Debug + 'static {
    /// Fetch units of target currency per one unit of source currency.
    async fn fetch_rate(&self) -> AppResult<f64>;
}

/// Unauthenticated HTTP GET against a public quote endpoint.
#[derive(Debug, Clone)]
pub struct HttpRateProvider {
    client: reqwest::Client,
    url: String,
    pointer: String,
}

impl HttpRateProvider {
    /// Build a provider from the currency configuration.
    pub fn new(config: &CurrencyConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            client,
            url: config.provider_url.clone(),
            pointer: config.rate_pointer.clone(),
        })
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_rate(&self) -> AppResult<f64> {
        debug!(url = %self.url, "Requesting exchange rate");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Rate request failed: {e}"),
                e,
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::from_status(
                status.as_u16(),
                format!("Rate provider returned {status}"),
            ));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Rate provider sent an unreadable body: {e}"),
                e,
            )
        })?;

        extract_rate(&body, &self.pointer)
    }
}

/// Pull the rate out of a provider response.
///
/// Quote APIs commonly send numbers as strings, so both forms are accepted.
pub fn extract_rate(body: &Value, pointer: &str) -> AppResult<f64> {
    let value = body.pointer(pointer).ok_or_else(|| {
        AppError::external_service(format!("Rate provider response has no value at '{pointer}'"))
    })?;

    let rate = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        AppError::external_service(format!("Value at '{pointer}' is not a number: {value}"))
    })?;

    if !rate.is_finite() || rate <= 0.0 {
        return Err(AppError::external_service(format!(
            "Rate provider returned an unusable rate: {rate}"
        )));
    }

    Ok(rate)
}
