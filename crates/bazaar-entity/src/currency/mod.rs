//! Currency conversion value objects.

pub mod rate;

pub use rate::ExchangeRate;
