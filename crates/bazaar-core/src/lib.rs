//! # bazaar-core
//!
//! Core crate for Bazaar Sync. Contains the configuration schemas,
//! typed identifiers, the cache and clock traits, and the unified
//! error system shared by every other crate in the workspace.
//!
//! This crate has **no** internal dependencies on other Bazaar crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
