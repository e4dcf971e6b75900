//! Convenience result type alias for Bazaar Sync.

use crate::error::AppError;

/// A specialized `Result` type for Bazaar Sync operations.
pub type AppResult<T> = Result<T, AppError>;
