//! Exchange rate value object.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A conversion factor fetched from the rate provider.
///
/// Replaced wholesale on every successful fetch; never partially mutated.
/// The persisted form is `{"rate": 5.2, "fetchedAt": <epoch millis>}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    /// Units of target currency per one unit of source currency.
    pub rate: f64,
    /// When the rate was retrieved.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Create a rate fetched at the given instant.
    pub fn new(rate: f64, fetched_at: DateTime<Utc>) -> Self {
        Self { rate, fetched_at }
    }

    /// A rate is usable only when it is a finite, positive number.
    pub fn is_valid(&self) -> bool {
        self.rate.is_finite() && self.rate > 0.0
    }

    /// Whether the rate is still within its freshness window at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, fresh_for: Duration) -> bool {
        now - self.fetched_at < fresh_for
    }

    /// Convert an amount of source currency into the target currency.
    pub fn convert(&self, amount: f64) -> f64 {
        amount * self.rate
    }
}
