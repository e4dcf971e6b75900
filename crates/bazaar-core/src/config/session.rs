//! Signed-in session settings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user the sync agent binds to on startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Authenticated user id, if any.
    #[serde(default)]
    pub user_id: Option<Uuid>,
}
