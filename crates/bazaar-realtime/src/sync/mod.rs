//! Background synchronisation for one bound user.

pub mod backoff;
pub(crate) mod driver;

pub use backoff::{Backoff, next_delay};
