//! Versioned local store on top of a key-value backend.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::entry::{next_version, Entry, EntryMeta, StoredValue};
use super::error::StoreError;
use crate::keys::DataKey;
use crate::storage::KeyValueBackend;

/// Something that can free storage space when the backend is full.
pub trait CapacityReclaimer: Send + Sync {
    /// Frees what it can and returns the number of records dropped.
    fn reclaim(&self) -> usize;
}

/// Keyed, versioned persistence of [`Entry`] values.
///
/// Each key has its own lock, held while a version is chosen and the entry
/// written. Writes to one key are therefore serialized and strictly
/// versioned, while writes to different keys never wait on each other.
pub struct Store {
    backend: Arc<dyn KeyValueBackend>,
    reclaimer: Option<Arc<dyn CapacityReclaimer>>,
    /// Last version issued per key, indexed by `DataKey::index`.
    versions: [Mutex<Option<i64>>; DataKey::COUNT],
}

impl Store {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend,
            reclaimer: None,
            versions: std::array::from_fn(|_| Mutex::new(None)),
        }
    }

    /// Sets the hook run once when a write hits the storage quota.
    pub fn with_reclaimer(mut self, reclaimer: Arc<dyn CapacityReclaimer>) -> Self {
        self.reclaimer = Some(reclaimer);
        self
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &Arc<dyn KeyValueBackend> {
        &self.backend
    }

    /// Persists `data` under `key` as a freshly stamped entry.
    ///
    /// On a quota failure the reclaimer runs once and the write is retried
    /// once; if that fails too, [`StoreError::StorageFull`] is returned.
    pub fn save(&self, key: DataKey, data: Value) -> Result<Entry, StoreError> {
        let mut last_version = self.version_slot(key);

        let previous = match *last_version {
            Some(v) => Some(v),
            None => self.stored_version(key),
        };

        let now = Utc::now();
        let entry = Entry {
            data,
            version: next_version(previous, now.timestamp_millis()),
            last_modified: now,
            change_id: Uuid::new_v4().to_string(),
        };
        let raw = serde_json::to_string(&entry)?;

        self.write(key, &raw)?;
        *last_version = Some(entry.version);

        tracing::debug!("Saved {} at version {}", key, entry.version);
        Ok(entry)
    }

    /// Loads the payload stored under `key`, or `default` if there is none.
    ///
    /// Legacy bare payloads are upgraded to the entry format in place.
    /// Malformed data is logged and degrades to `default`.
    pub fn load(&self, key: DataKey, default: Value) -> Value {
        match self.read(key) {
            Ok(None) => default,
            Ok(Some(StoredValue::Entry(entry))) => entry.data,
            Ok(Some(StoredValue::Legacy(data))) => {
                if let Err(e) = self.save(key, data.clone()) {
                    tracing::warn!("Failed to upgrade legacy data for {}: {}", key, e);
                } else {
                    tracing::debug!("Upgraded legacy data for {}", key);
                }
                data
            }
            Err(e) => {
                tracing::warn!("Error loading data for {}: {}", key, e);
                default
            }
        }
    }

    /// Returns the enveloped entry under `key`, if any.
    ///
    /// Legacy payloads have no version metadata and yield `None`.
    pub fn entry(&self, key: DataKey) -> Result<Option<Entry>, StoreError> {
        match self.read(key)? {
            Some(StoredValue::Entry(entry)) => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    /// Returns version metadata for `key`, or `None` if absent or unreadable.
    pub fn get_meta(&self, key: DataKey) -> Option<EntryMeta> {
        match self.entry(key) {
            Ok(entry) => entry.map(|e| e.meta()),
            Err(e) => {
                tracing::warn!("Error getting metadata for {}: {}", key, e);
                None
            }
        }
    }

    fn version_slot(&self, key: DataKey) -> MutexGuard<'_, Option<i64>> {
        self.versions[key.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn stored_version(&self, key: DataKey) -> Option<i64> {
        self.entry(key).ok().flatten().map(|e| e.version)
    }

    fn read(&self, key: DataKey) -> Result<Option<StoredValue>, StoreError> {
        let raw = match self.backend.get(key.storage_key())? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let parsed: Value =
            serde_json::from_str(&raw).map_err(|e| StoreError::MalformedStoredData {
                key,
                reason: e.to_string(),
            })?;

        let is_envelope = parsed
            .as_object()
            .is_some_and(|obj| obj.contains_key("data") && obj.contains_key("version"));

        if !is_envelope {
            return Ok(Some(StoredValue::Legacy(parsed)));
        }

        serde_json::from_value(parsed)
            .map(|entry| Some(StoredValue::Entry(entry)))
            .map_err(|e| StoreError::MalformedStoredData {
                key,
                reason: e.to_string(),
            })
    }

    fn write(&self, key: DataKey, raw: &str) -> Result<(), StoreError> {
        let storage_key = key.storage_key();

        match self.backend.set(storage_key, raw) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_quota_exceeded() => {
                let freed = self.reclaimer.as_ref().map_or(0, |r| r.reclaim());
                tracing::warn!(
                    "Storage quota exceeded saving {}; cleared {} old record(s), retrying",
                    key,
                    freed
                );
            }
            Err(e) => return Err(e.into()),
        }

        self.backend.set(storage_key, raw).map_err(|e| {
            if e.is_quota_exceeded() {
                StoreError::StorageFull { key }
            } else {
                StoreError::Backend(e)
            }
        })
    }
}
