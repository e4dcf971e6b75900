//! Notification type enumeration.

use serde::{Deserialize, Serialize};

/// The domain event that produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// The user was mentioned in a post or comment.
    Mention,
    /// A new product was published to the catalog.
    Product,
    /// Community forum activity.
    Community,
    /// Admin broadcast announcement.
    Announcement,
    /// Operational alert.
    Alert,
    /// A community post by the user was approved by moderation.
    PostApproved,
    /// A community post by the user was rejected by moderation.
    PostRejected,
}

impl NotificationType {
    /// Every notification type, in display order.
    pub const ALL: [Self; 7] = [
        Self::Mention,
        Self::Product,
        Self::Community,
        Self::Announcement,
        Self::Alert,
        Self::PostApproved,
        Self::PostRejected,
    ];

    /// Return the type as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::Product => "product",
            Self::Community => "community",
            Self::Announcement => "announcement",
            Self::Alert => "alert",
            Self::PostApproved => "post_approved",
            Self::PostRejected => "post_rejected",
        }
    }

    /// Short human label shown next to the notification.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mention => "Mention",
            Self::Product => "New product",
            Self::Community => "Community",
            Self::Announcement => "Announcement",
            Self::Alert => "Alert",
            Self::PostApproved => "Post approved",
            Self::PostRejected => "Post rejected",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
