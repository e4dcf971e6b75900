//! Change events delivered by the notification change stream.

use serde::{Deserialize, Serialize};

use bazaar_core::types::id::NotificationId;
use bazaar_entity::notification::Notification;

/// One row-level change to the `notifications` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A notification row was created.
    Insert {
        /// The new row.
        record: Notification,
    },
    /// A notification row changed (typically `is_read`).
    Update {
        /// The row after the change.
        record: Notification,
    },
    /// A notification row was deleted.
    Delete {
        /// Id of the removed row.
        id: NotificationId,
    },
}

impl ChangeEvent {
    /// Id of the affected notification.
    pub fn notification_id(&self) -> NotificationId {
        match self {
            Self::Insert { record } | Self::Update { record } => record.id,
            Self::Delete { id } => *id,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}
