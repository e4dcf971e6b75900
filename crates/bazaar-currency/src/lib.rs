//! # bazaar-currency
//!
//! Process-wide currency conversion for Bazaar Sync.
//!
//! - [`RateCache`]: one shared view of the source→target conversion factor,
//!   hydrated from the persisted cache at startup, fresh for one hour,
//!   with at most one provider request in flight at any time
//! - [`RateProvider`]: the rate source seam, with an HTTP implementation
//! - [`RateSnapshot`]: the synchronous `{ rate, is_loading, error }` view
//!   handed to every consumer and subscriber

pub mod cache;
pub mod provider;
pub mod snapshot;

pub use cache::RateCache;
pub use provider::{HttpRateProvider, RateProvider};
pub use snapshot::RateSnapshot;
