//! Point-in-time view of the shared rate state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_entity::currency::ExchangeRate;

/// What every consumer of the rate cache sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateSnapshot {
    /// Current conversion factor, if any is known.
    pub rate: Option<f64>,
    /// When the served rate was fetched.
    pub fetched_at: Option<DateTime<Utc>>,
    /// A provider request is in flight.
    pub is_loading: bool,
    /// Last fetch failure, kept while a fallback (or nothing) is served.
    pub error: Option<String>,
}

impl RateSnapshot {
    /// Snapshot serving a successfully fetched or fresh cached rate.
    pub fn ready(rate: ExchangeRate) -> Self {
        Self {
            rate: Some(rate.rate),
            fetched_at: Some(rate.fetched_at),
            is_loading: false,
            error: None,
        }
    }

    /// Snapshot after a failed fetch, serving the fallback if there is one.
    pub fn degraded(fallback: Option<ExchangeRate>, error: impl Into<String>) -> Self {
        Self {
            rate: fallback.map(|r| r.rate),
            fetched_at: fallback.map(|r| r.fetched_at),
            is_loading: false,
            error: Some(error.into()),
        }
    }

    /// `None` until a rate is available, otherwise `amount * rate`.
    pub fn convert(&self, amount: f64) -> Option<f64> {
        self.rate.map(|rate| amount * rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_with_rate() {
        let snapshot = RateSnapshot::ready(ExchangeRate::new(0.75, Utc::now()));
        assert_eq!(snapshot.convert(200.0), Some(150.0));
    }

    #[test]
    fn test_convert_without_rate() {
        assert_eq!(RateSnapshot::default().convert(200.0), None);
    }

    #[test]
    fn test_degraded_keeps_fallback() {
        let snapshot =
            RateSnapshot::degraded(Some(ExchangeRate::new(5.2, Utc::now())), "timeout");
        assert_eq!(snapshot.convert(100.0), Some(520.0));
        assert_eq!(snapshot.error.as_deref(), Some("timeout"));
        assert!(!snapshot.is_loading);
    }
}
