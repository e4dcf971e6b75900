//! Cache key builders for all Bazaar cache entries.

/// Prefix applied to all Bazaar cache keys.
const PREFIX: &str = "bazaar";

/// Cache key for the persisted exchange rate of a currency pair.
pub fn exchange_rate(base: &str, target: &str) -> String {
    format!(
        "{PREFIX}:currency:{}-{}",
        base.to_uppercase(),
        target.to_uppercase()
    )
}
