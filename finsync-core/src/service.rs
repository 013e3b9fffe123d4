//! The data service: one store and one synchronizer working together.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::keys::DataKey;
use crate::models::Document;
use crate::storage::{KeyValueBackend, MemoryBackend};
use crate::store::{Entry, EntryMeta, SaveReceipt, Store, StoreError};
use crate::sync::{
    NoticeKind, RemoteSync, SimulatedRemote, Subscription, SyncError, SyncEvent, SyncInfo,
    SyncSettings, SyncStatus, Synchronizer,
};

/// Format version written into export bundles.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Options for [`DataService::save`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Sync right after the write if online
    pub sync_immediately: bool,
    /// Do not emit `DataChanged`
    pub silent: bool,
}

impl SaveOptions {
    pub fn immediate() -> Self {
        Self {
            sync_immediately: true,
            silent: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            sync_immediately: false,
            silent: true,
        }
    }
}

/// Full backup of every stored key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub export_time: DateTime<Utc>,
    pub version: String,
    pub data: BTreeMap<DataKey, ExportedEntry>,
    pub sync_status: ExportedSyncStatus,
}

impl ExportBundle {
    /// Default backup file name, e.g. `finance-data-backup-2024-01-15.json`.
    pub fn file_name(&self) -> String {
        format!(
            "finance-data-backup-{}.json",
            self.export_time.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedEntry {
    pub data: Value,
    pub meta: Option<EntryMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSyncStatus {
    pub status: SyncStatus,
    pub last_sync: Option<DateTime<Utc>>,
    pub pending_changes: usize,
    pub is_online: bool,
}

/// Outcome of [`DataService::import_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub imported_count: usize,
    /// Keys whose value was null and therefore left untouched
    pub skipped: Vec<DataKey>,
    /// Keys that failed to save, with the reason
    pub failed: Vec<(DataKey, String)>,
}

/// Front door for reading and writing finance data.
///
/// Saves go through the [`Store`], are queued on the [`Synchronizer`] and
/// announced to listeners. One instance serves the whole application; pass
/// it around as `Arc<DataService>`.
pub struct DataService {
    store: Store,
    sync: Arc<Synchronizer>,
}

impl DataService {
    pub fn new(
        backend: Arc<dyn KeyValueBackend>,
        remote: Arc<dyn RemoteSync>,
        settings: SyncSettings,
        is_online: bool,
    ) -> Self {
        let sync = Synchronizer::new(backend.clone(), remote, settings, is_online);
        Self::from_parts(backend, sync)
    }

    /// Builds the service around an already configured synchronizer. The
    /// synchronizer also frees space when the backend runs full.
    pub fn from_parts(backend: Arc<dyn KeyValueBackend>, sync: Synchronizer) -> Self {
        let sync = Arc::new(sync);
        let store = Store::new(backend).with_reclaimer(sync.clone());
        Self { store, sync }
    }

    /// An online service over an in-memory backend with an instant remote.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(SimulatedRemote::instant()),
            SyncSettings::default(),
            true,
        )
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.sync
    }

    /// Starts background tasks. See [`Synchronizer::init`].
    pub fn init(&self, connectivity: watch::Receiver<bool>) {
        self.sync.init(connectivity);
    }

    /// Stops background tasks and drops every listener.
    pub fn dispose(&self) {
        self.sync.dispose();
    }

    /// Saves `value` under `key`, syncing first if asked to.
    ///
    /// The write is queued for sync whether or not the host is online.
    /// Listeners hear `DataChanged` after the optional sync, unless the save
    /// is silent. A failed sync does not fail the save.
    pub async fn save(
        &self,
        key: DataKey,
        value: Value,
        options: SaveOptions,
    ) -> Result<SaveReceipt, StoreError> {
        let entry = self.write(key, value)?;

        if options.sync_immediately && self.sync.is_online() {
            if let Err(e) = self.sync.sync().await {
                tracing::warn!("Immediate sync after saving {} failed: {}", key, e);
            }
        }

        Ok(self.announce(key, entry, options.silent))
    }

    /// Saves without syncing. Usable where awaiting is not possible, such as
    /// teardown paths.
    pub fn persist(&self, key: DataKey, value: Value, silent: bool) -> Result<SaveReceipt, StoreError> {
        let entry = self.write(key, value)?;
        Ok(self.announce(key, entry, silent))
    }

    /// Loads the payload under `key`, or `default`.
    pub fn load(&self, key: DataKey, default: Value) -> Value {
        self.store.load(key, default)
    }

    pub fn get_meta(&self, key: DataKey) -> Option<EntryMeta> {
        self.store.get_meta(key)
    }

    /// Loads a typed document, or its default when the key is absent.
    ///
    /// Stored data of another shape is reported as
    /// [`StoreError::MalformedStoredData`] rather than replaced by the
    /// default, so a later save cannot overwrite it unnoticed.
    pub fn load_document<T: Document>(&self) -> Result<T, StoreError> {
        decode_document(T::KEY, self.store.load(T::KEY, Value::Null))
    }

    pub async fn save_document<T: Document>(
        &self,
        document: &T,
        options: SaveOptions,
    ) -> Result<SaveReceipt, StoreError> {
        let value = serde_json::to_value(document)?;
        self.save(T::KEY, value, options).await
    }

    /// Snapshots every stored key and the sync status.
    pub fn export_all(&self) -> ExportBundle {
        let mut data = BTreeMap::new();
        for key in DataKey::ALL {
            let value = self.store.load(key, Value::Null);
            if value.is_null() {
                continue;
            }
            data.insert(
                key,
                ExportedEntry {
                    data: value,
                    meta: self.store.get_meta(key),
                },
            );
        }

        let info = self.sync.get_sync_info();
        ExportBundle {
            export_time: Utc::now(),
            version: EXPORT_FORMAT_VERSION.to_string(),
            data,
            sync_status: ExportedSyncStatus {
                status: info.status,
                last_sync: info.last_sync,
                pending_changes: info.pending_changes,
                is_online: info.is_online,
            },
        }
    }

    /// Restores keys from a bundle produced by [`DataService::export_all`].
    ///
    /// The whole bundle is validated before anything is written; a bundle
    /// without a `data` object, with an unknown key or with an entry lacking
    /// `data` is rejected with [`StoreError::InvalidFormat`]. Each key is
    /// then saved silently and independently, and one sync follows if
    /// online.
    pub async fn import_all(&self, bundle: &Value) -> Result<ImportReport, StoreError> {
        let entries = validate_bundle(bundle)?;
        let mut report = ImportReport::default();

        for (key, value) in entries {
            if value.is_null() {
                report.skipped.push(key);
                continue;
            }
            match self.persist(key, value, true) {
                Ok(_) => report.imported_count += 1,
                Err(e) => {
                    tracing::error!("Failed to import {}: {}", key, e);
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        if report.imported_count > 0 && self.sync.is_online() {
            if let Err(e) = self.sync.sync().await {
                tracing::warn!("Sync after import failed: {}", e);
            }
        }

        tracing::info!("Imported {} keys", report.imported_count);
        Ok(report)
    }

    /// Signals shutdown. Every live binding flushes its unsaved edits before
    /// this returns.
    pub fn unload(&self) {
        tracing::debug!("Unloading data service");
        self.sync.emit(SyncEvent::Unloading);
    }

    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.sync.add_listener(listener)
    }

    pub fn get_sync_info(&self) -> SyncInfo {
        self.sync.get_sync_info()
    }

    pub async fn force_sync_now(&self) -> Result<usize, SyncError> {
        self.sync.force_sync_now().await
    }

    fn write(&self, key: DataKey, value: Value) -> Result<Entry, StoreError> {
        match self.store.save(key, value) {
            Ok(entry) => {
                self.sync.enqueue(key, &entry);
                Ok(entry)
            }
            Err(e) => {
                tracing::error!("Error saving {}: {}", key, e);
                if e.is_storage_full() {
                    self.sync.notifier().notify(&e.to_string(), NoticeKind::Warning);
                }
                Err(e)
            }
        }
    }

    fn announce(&self, key: DataKey, entry: Entry, silent: bool) -> SaveReceipt {
        let receipt = SaveReceipt {
            change_id: entry.change_id,
            version: entry.version,
        };
        if !silent {
            self.sync.emit(SyncEvent::DataChanged {
                key,
                value: entry.data,
            });
        }
        receipt
    }
}

/// Decodes a stored value into `T`; null means absent and yields `default`.
pub(crate) fn decode_stored<T: DeserializeOwned>(
    key: DataKey,
    value: Value,
    default: impl FnOnce() -> T,
) -> Result<T, StoreError> {
    if value.is_null() {
        return Ok(default());
    }
    serde_json::from_value(value).map_err(|e| {
        tracing::warn!("Stored {} does not match its schema: {}", key, e);
        StoreError::MalformedStoredData {
            key,
            reason: e.to_string(),
        }
    })
}

fn decode_document<T: Document>(key: DataKey, value: Value) -> Result<T, StoreError> {
    decode_stored(key, value, T::default)
}

fn validate_bundle(bundle: &Value) -> Result<Vec<(DataKey, Value)>, StoreError> {
    let data = bundle
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| StoreError::InvalidFormat("missing data object".to_string()))?;

    let mut entries = Vec::with_capacity(data.len());
    for (name, entry) in data {
        let key = DataKey::parse(name)
            .ok_or_else(|| StoreError::InvalidFormat(format!("unknown key '{}'", name)))?;
        let value = entry
            .get("data")
            .ok_or_else(|| StoreError::InvalidFormat(format!("{} has no data field", name)))?;
        entries.push((key, value.clone()));
    }
    Ok(entries)
}
