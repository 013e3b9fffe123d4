//! Store error types.

use thiserror::Error;

use crate::keys::DataKey;
use crate::storage::BackendError;

/// Errors returned by store operations.
///
/// Store operations never panic on bad input or a full medium; callers
/// branch on these variants instead.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage is full: {key} could not be saved even after freeing space. Free up space or export a backup.")]
    StorageFull { key: DataKey },

    #[error("Invalid import format: {0}")]
    InvalidFormat(String),

    #[error("Malformed stored data for {key}: {reason}")]
    MalformedStoredData { key: DataKey, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StoreError {
    /// Returns true for the capacity failure users must act on.
    pub fn is_storage_full(&self) -> bool {
        matches!(self, StoreError::StorageFull { .. })
    }
}
