//! Observable store state.

use serde::Serialize;

use bazaar_core::types::id::{NotificationId, UserId};
use bazaar_entity::notification::{Notification, NotificationType};

/// Lifecycle of the notification store for the bound user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    /// No user is signed in. The list is empty.
    Unbound,
    /// Bulk load in flight; the change stream is not attached yet.
    Loading,
    /// Loaded, change stream attached.
    Live,
    /// Loaded, but the change stream dropped and is being re-established.
    Reconnecting,
    /// The bulk load failed. It is retried with backoff.
    Failed {
        /// Message from the last failed load.
        error: String,
    },
}

impl SyncState {
    /// Short name for logs and tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unbound => "unbound",
            Self::Loading => "loading",
            Self::Live => "live",
            Self::Reconnecting => "reconnecting",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether the list reflects a completed load.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Live | Self::Reconnecting)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { error } => write!(f, "failed: {error}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Everything a view needs to render the notification center.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationSnapshot {
    /// User the list belongs to.
    pub user_id: Option<UserId>,
    /// Store lifecycle.
    pub state: SyncState,
    /// Notifications, newest first.
    pub items: Vec<Notification>,
    /// Unread items in `items`.
    pub unread_count: usize,
}

impl Default for NotificationSnapshot {
    fn default() -> Self {
        Self {
            user_id: None,
            state: SyncState::Unbound,
            items: Vec::new(),
            unread_count: 0,
        }
    }
}

/// Transient alert raised for a newly arrived notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Id of the notification that raised the alert.
    pub id: NotificationId,
    /// Category, for choosing an icon.
    pub kind: NotificationType,
    /// Alert heading.
    pub title: String,
    /// Alert body.
    pub message: String,
    /// Optional navigation target.
    pub link: Option<String>,
}

impl From<&Notification> for Alert {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            title: notification.title.clone(),
            message: notification.message.clone(),
            link: notification.link.clone(),
        }
    }
}
