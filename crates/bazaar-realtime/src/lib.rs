//! # bazaar-realtime
//!
//! Notification sync for Bazaar Sync. Provides:
//!
//! - An ordered, idempotent projection of a user's notifications
//!   ([`NotificationList`]) fed by insert/update/delete change events
//! - The per-user [`NotificationStore`] state machine
//!   (`Unbound → Loading → Live`, with `Reconnecting` and `Failed`)
//! - A sync driver that loads, attaches the change stream, reconnects
//!   with exponential backoff and periodically reconciles
//! - Backends: in-memory (tests, demos) and REST + WebSocket feed

pub mod backend;
pub mod event;
pub mod feed;
pub mod list;
pub mod state;
pub mod store;
pub mod sync;

pub use backend::{ChangeStream, NotificationBackend};
pub use event::ChangeEvent;
pub use list::{Applied, NotificationList};
pub use state::{Alert, NotificationSnapshot, SyncState};
pub use store::NotificationStore;
