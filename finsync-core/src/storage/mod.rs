//! Key-value substrate for persisted entries.
//!
//! The store never touches a concrete medium directly. It talks to a
//! [`KeyValueBackend`], which maps string keys to raw JSON text:
//!
//! - [`MemoryBackend`]: in-process map with an optional byte capacity
//! - [`FileBackend`]: one `<key>.json` file per key in a data directory
//!
//! Layout of a file-backed data directory:
//! ```text
//! ~/.local/share/finsync/
//! ├── userGoals.json          # {"data": ..., "version": ..., ...}
//! ├── userBudgets.json
//! ├── pendingChanges.json     # sync queue
//! ├── syncStatus.json
//! └── lastSyncTime.json
//! ```

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use std::io;
use std::path::PathBuf;

/// A minimal key-value interface over a persistence medium.
///
/// Implementations must make `set` atomic from a reader's point of view: a
/// concurrent `get` observes either the previous value or the new one.
pub trait KeyValueBackend: Send + Sync {
    /// Returns the raw value stored under `key`, or `None`.
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Replaces the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), BackendError>;

    /// Lists every stored key.
    fn keys(&self) -> Result<Vec<String>, BackendError>;
}

/// Errors raised by a storage backend.
#[derive(Debug)]
pub enum BackendError {
    /// The medium has no room left for the write.
    QuotaExceeded(String),
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
}

impl BackendError {
    /// Returns true if the write failed for lack of space.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, BackendError::QuotaExceeded(_))
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::QuotaExceeded(key) => {
                write!(f, "Storage quota exceeded while writing '{}'", key)
            }
            BackendError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::IoError(_, e) => Some(e),
            BackendError::QuotaExceeded(_) => None,
        }
    }
}
