//! # bazaar-cache
//!
//! Persisted key/value providers for Bazaar Sync. Supports three modes:
//!
//! - **memory**: In-process cache using [moka](https://crates.io/crates/moka)
//! - **file**: A single JSON document on disk that survives restarts
//! - **redis**: Redis-backed cache using the [redis](https://crates.io/crates/redis) crate
//!
//! The provider is selected at runtime based on configuration.

pub mod file;
pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::CacheManager;
