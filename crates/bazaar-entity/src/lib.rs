//! # bazaar-entity
//!
//! Domain entity models for Bazaar Sync. Every struct in this crate is
//! either a row of the managed backend (`notifications`) or a value
//! object persisted on the client (`ExchangeRate`). All entities derive
//! `Debug`, `Clone`, `Serialize` and `Deserialize`.

pub mod currency;
pub mod notification;
