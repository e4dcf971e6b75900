//! Notification backends: bulk queries, row mutations, and the change stream.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use futures::stream::BoxStream;

use bazaar_core::result::AppResult;
use bazaar_core::types::id::{NotificationId, UserId};
use bazaar_entity::notification::Notification;

use crate::event::ChangeEvent;

pub use memory::MemoryNotificationBackend;
pub use rest::RestNotificationBackend;

/// Live change events for one user's rows.
///
/// The stream ends (or yields an error) when the subscription drops.
pub type ChangeStream = BoxStream<'static, AppResult<ChangeEvent>>;

/// Server-side notification storage scoped to a user.
///
/// Mutations only change the server. Their visible effect reaches the
/// store as change events on the subscription.
#[async_trait]
pub trait NotificationBackend: Send + Sync + std::fmt::Debug + 'static {
    /// All notifications for the user (any order).
    async fn list_for_user(&self, user: UserId) -> AppResult<Vec<Notification>>;

    /// Set `is_read` on one of the user's notifications.
    async fn mark_read(&self, user: UserId, id: NotificationId) -> AppResult<()>;

    /// Set `is_read` on every unread notification of the user.
    async fn mark_all_read(&self, user: UserId) -> AppResult<()>;

    /// Delete one of the user's notifications.
    async fn delete(&self, user: UserId, id: NotificationId) -> AppResult<()>;

    /// Delete every notification of the user.
    async fn delete_all(&self, user: UserId) -> AppResult<()>;

    /// Attach to the change feed filtered to the user's rows.
    async fn subscribe(&self, user: UserId) -> AppResult<ChangeStream>;
}
