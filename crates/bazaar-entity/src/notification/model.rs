//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::types::id::{NotificationId, UserId};

use super::kind::NotificationType;

/// A notification delivered to exactly one user.
///
/// Rows are created by server-side triggers; the owning user may only
/// flip `is_read` or delete the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// The recipient user.
    pub user_id: UserId,
    /// Domain event that produced the notification.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub message: String,
    /// In-app route or URL the notification points to.
    #[serde(default)]
    pub link: Option<String>,
    /// Whether the user has read this notification.
    #[serde(default)]
    pub is_read: bool,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
    /// The user whose action triggered the notification.
    #[serde(default)]
    pub sender_id: Option<UserId>,
}

impl Notification {
    /// Check if the notification has not been read yet.
    pub fn is_unread(&self) -> bool {
        !self.is_read
    }
}
