//! The sync state machine and the change queue it drives.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::error::SyncError;
use super::events::{ListenerRegistry, Subscription, SyncEvent};
use super::host::{NoticeKind, Notifier, TracingNotifier};
use super::queue::{ChangeQueue, PendingChange};
use super::remote::{Acknowledged, RemoteSync};
use super::state::{SyncInfo, SyncSettings, SyncStatus};
use crate::keys::DataKey;
use crate::storage::{BackendError, KeyValueBackend};
use crate::store::{CapacityReclaimer, Entry};

const PENDING_CHANGES_KEY: &str = "pendingChanges";
const SYNC_STATUS_KEY: &str = "syncStatus";
const LAST_SYNC_KEY: &str = "lastSyncTime";

const OFFLINE_MESSAGE: &str =
    "You're offline. Changes are saved locally and will sync when you reconnect.";
const ONLINE_MESSAGE: &str = "Back online.";
const SYNC_ERROR_MESSAGE: &str =
    "Sync failed. Your changes are saved locally; retry with a forced sync.";

struct SyncState {
    status: SyncStatus,
    is_online: bool,
    last_sync: Option<DateTime<Utc>>,
    queue: ChangeQueue,
}

impl SyncState {
    fn status_event(&self) -> SyncEvent {
        SyncEvent::SyncStatusChanged {
            status: self.status,
            is_online: self.is_online,
            last_sync: self.last_sync,
            pending_count: self.queue.pending_count(),
        }
    }
}

/// Owns the pending-change queue, the sync status and the listeners.
///
/// Queue, status and last sync time are persisted through the backend under
/// internal keys, so a restart resumes with the same queue. Events are
/// emitted with no lock held; listeners may call back into the synchronizer.
pub struct Synchronizer {
    backend: Arc<dyn KeyValueBackend>,
    remote: Arc<dyn RemoteSync>,
    notifier: Arc<dyn Notifier>,
    settings: SyncSettings,
    state: Mutex<SyncState>,
    dirty: Mutex<BTreeSet<String>>,
    listeners: Arc<ListenerRegistry>,
    /// Held for the duration of a sync attempt
    sync_gate: tokio::sync::Mutex<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Synchronizer {
    /// Creates a synchronizer, restoring any queue persisted in `backend`.
    ///
    /// Starting offline yields `offline`. Starting online keeps a persisted
    /// `error` status so the retry affordance survives a restart. Starting
    /// online with undelivered changes is also `error` until a sync drains
    /// them; otherwise the status is `synced`.
    pub fn new(
        backend: Arc<dyn KeyValueBackend>,
        remote: Arc<dyn RemoteSync>,
        settings: SyncSettings,
        is_online: bool,
    ) -> Self {
        let queue = ChangeQueue::from_changes(
            read_internal::<Vec<PendingChange>>(backend.as_ref(), PENDING_CHANGES_KEY)
                .unwrap_or_default(),
        );
        let persisted_status = read_internal::<SyncStatus>(backend.as_ref(), SYNC_STATUS_KEY);
        let last_sync = read_internal::<DateTime<Utc>>(backend.as_ref(), LAST_SYNC_KEY);

        let status = match (is_online, persisted_status) {
            (false, _) => SyncStatus::Offline,
            (true, Some(SyncStatus::Error)) => SyncStatus::Error,
            (true, _) if queue.pending_count() > 0 => SyncStatus::Error,
            (true, _) => SyncStatus::Synced,
        };

        tracing::debug!(
            "Restored sync state: {} ({} pending)",
            status,
            queue.pending_count()
        );

        Self {
            backend,
            remote,
            notifier: Arc::new(TracingNotifier),
            settings,
            state: Mutex::new(SyncState {
                status,
                is_online,
                last_sync,
                queue,
            }),
            dirty: Mutex::new(BTreeSet::new()),
            listeners: Arc::new(ListenerRegistry::new()),
            sync_gate: tokio::sync::Mutex::new(()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Starts the auto-save ticker and the connectivity watcher.
    ///
    /// The watcher syncs leftover changes once the initial connectivity is
    /// known; each tick retries any changes still pending. Must be called
    /// from within a tokio runtime. Both tasks hold weak references and stop
    /// once the synchronizer is dropped or disposed.
    pub fn init(self: &Arc<Self>, mut connectivity: watch::Receiver<bool>) {
        let mut tasks = self.lock_tasks();
        if !tasks.is_empty() {
            tracing::debug!("Synchronizer already initialized");
            return;
        }

        let weak = Arc::downgrade(self);
        let period = self.settings.auto_save_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(this) => {
                        this.auto_save_tick();
                        this.retry_pending("Periodic sync").await;
                    }
                    None => break,
                }
            }
        }));

        let weak: Weak<Self> = Arc::downgrade(self);
        tasks.push(tokio::spawn(async move {
            let initial = *connectivity.borrow_and_update();
            if let Some(this) = weak.upgrade() {
                this.set_online(initial).await;
                this.retry_pending("Startup sync").await;
            }
            while connectivity.changed().await.is_ok() {
                let online = *connectivity.borrow_and_update();
                match weak.upgrade() {
                    Some(this) => this.set_online(online).await,
                    None => break,
                }
            }
        }));
    }

    /// Stops background tasks and drops every listener.
    pub fn dispose(&self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
        self.listeners.clear();
        self.lock_dirty().clear();
    }

    /// Records a connectivity change.
    ///
    /// Going offline moves to `offline`. Coming back online syncs the queue
    /// if it holds unsynced changes, otherwise moves straight to `synced`.
    pub async fn set_online(&self, online: bool) {
        let event = {
            let mut state = self.lock_state();
            if state.is_online == online {
                return;
            }
            state.is_online = online;

            if online && state.queue.pending_count() > 0 {
                None
            } else {
                let status = if online {
                    SyncStatus::Synced
                } else {
                    SyncStatus::Offline
                };
                Some(self.set_status(&mut state, status))
            }
        };

        if online {
            tracing::info!("Connectivity restored");
            self.notifier.notify(ONLINE_MESSAGE, NoticeKind::Info);
        } else {
            tracing::info!("Connectivity lost");
            self.notifier.notify(OFFLINE_MESSAGE, NoticeKind::Info);
        }

        match event {
            Some(event) => self.emit_status(event),
            None => {
                if let Err(e) = self.sync().await {
                    tracing::warn!("Sync after reconnect failed: {}", e);
                }
            }
        }
    }

    pub fn is_online(&self) -> bool {
        self.lock_state().is_online
    }

    pub fn status(&self) -> SyncStatus {
        self.lock_state().status
    }

    /// Appends a change for `entry` and persists the queue.
    pub fn enqueue(&self, key: DataKey, entry: &Entry) {
        let mut state = self.lock_state();
        state.queue.push(PendingChange::new(key, entry.clone()));
        self.persist_queue(&mut state.queue);
        tracing::debug!(
            "Queued change {} for {} ({} pending)",
            entry.change_id,
            key,
            state.queue.pending_count()
        );
    }

    /// Sends every unsynced change to the remote.
    ///
    /// A no-op returning `Ok(0)` when offline or when nothing is pending.
    /// Otherwise returns the number of changes acknowledged.
    pub async fn sync(&self) -> Result<usize, SyncError> {
        let _gate = self.sync_gate.lock().await;

        let (batch, event) = {
            let mut state = self.lock_state();
            if !state.is_online {
                return Ok(0);
            }
            let batch = state.queue.unsynced();
            if batch.is_empty() {
                return Ok(0);
            }
            let event = self.set_status(&mut state, SyncStatus::Syncing);
            (batch, event)
        };
        self.emit_status(event);

        tracing::debug!("Syncing {} changes", batch.len());
        let timeout = self.settings.sync_timeout;
        let outcome = match tokio::time::timeout(timeout, self.remote.push(&batch)).await {
            Ok(Ok(acked)) => Ok(acked),
            Ok(Err(e)) => Err(SyncError::Failure(e.to_string())),
            Err(_) => Err(SyncError::TimedOut(timeout)),
        };

        match outcome {
            Ok(acked) => self.apply_acknowledged(&batch, &acked),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Syncs now, waiting for any sync already in flight.
    ///
    /// Fails with [`SyncError::Offline`] when disconnected; nothing changes.
    pub async fn force_sync_now(&self) -> Result<usize, SyncError> {
        if !self.is_online() {
            return Err(SyncError::Offline);
        }
        self.sync().await
    }

    async fn retry_pending(&self, context: &str) {
        if !self.is_online() || self.get_sync_info().pending_changes == 0 {
            return;
        }
        if let Err(e) = self.sync().await {
            tracing::warn!("{} failed: {}", context, e);
        }
    }

    pub fn mark_dirty(&self, component_id: &str) {
        self.lock_dirty().insert(component_id.to_string());
    }

    pub fn mark_clean(&self, component_id: &str) {
        self.lock_dirty().remove(component_id);
    }

    pub fn is_dirty(&self, component_id: &str) -> bool {
        self.lock_dirty().contains(component_id)
    }

    pub fn dirty_components(&self) -> Vec<String> {
        self.lock_dirty().iter().cloned().collect()
    }

    /// Announces the dirty components and clears the set.
    ///
    /// Returns the announced components. Persisting them is up to whoever
    /// owns each component.
    pub fn auto_save_tick(&self) -> Vec<String> {
        let dirty: Vec<String> = std::mem::take(&mut *self.lock_dirty()).into_iter().collect();
        if !dirty.is_empty() {
            tracing::debug!("Auto-save: {} dirty components", dirty.len());
            self.emit(SyncEvent::AutoSave {
                dirty_components: dirty.clone(),
            });
        }
        dirty
    }

    /// Registers a listener for every [`SyncEvent`].
    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.listeners.add(Arc::new(listener));
        Subscription::new(id, &self.listeners)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        self.listeners.emit(&event);
    }

    pub fn get_sync_info(&self) -> SyncInfo {
        let state = self.lock_state();
        SyncInfo {
            status: state.status,
            is_online: state.is_online,
            last_sync: state.last_sync,
            pending_changes: state.queue.pending_count(),
            total_changes: state.queue.len(),
        }
    }

    /// Returns a copy of the whole queue, synced changes included.
    pub fn pending_changes(&self) -> Vec<PendingChange> {
        self.lock_state().queue.as_slice().to_vec()
    }

    fn apply_acknowledged(
        &self,
        batch: &[PendingChange],
        acked: &Acknowledged,
    ) -> Result<usize, SyncError> {
        let now = Utc::now();
        let remaining = batch.iter().filter(|c| !acked.contains(&c.id)).count();

        let (marked, event) = {
            let mut state = self.lock_state();
            let marked = state.queue.mark_synced(acked, now);

            let event = if remaining == 0 {
                let purged = state.queue.purge_synced_before(now - self.settings.retention);
                if purged > 0 {
                    tracing::debug!("Purged {} old synced changes", purged);
                }
                state.last_sync = Some(now);
                self.write_internal(LAST_SYNC_KEY, &now);
                self.persist_queue(&mut state.queue);
                if state.is_online {
                    Some(self.set_status(&mut state, SyncStatus::Synced))
                } else {
                    None
                }
            } else {
                self.persist_queue(&mut state.queue);
                None
            };
            (marked, event)
        };

        if remaining > 0 {
            let error = SyncError::Unacknowledged { remaining };
            self.fail(&error);
            return Err(error);
        }

        if let Some(event) = event {
            self.emit_status(event);
        }
        tracing::info!("Synced {} changes", marked);
        self.emit(SyncEvent::SyncCompleted {
            synced_count: marked,
            timestamp: now,
        });
        Ok(marked)
    }

    fn fail(&self, error: &SyncError) {
        tracing::error!("{}", error);

        let event = {
            let mut state = self.lock_state();
            if state.is_online {
                Some(self.set_status(&mut state, SyncStatus::Error))
            } else {
                None
            }
        };

        if let Some(event) = event {
            self.emit_status(event);
        }
        self.emit(SyncEvent::SyncFailed {
            error: error.to_string(),
        });
        self.notifier.notify(SYNC_ERROR_MESSAGE, NoticeKind::Error);
    }

    /// Moves to `status` and returns the event to emit once unlocked, or
    /// `None` if the status did not change.
    fn set_status(&self, state: &mut SyncState, status: SyncStatus) -> Option<SyncEvent> {
        if state.status == status {
            return None;
        }
        tracing::debug!("Sync status {} -> {}", state.status, status);
        state.status = status;
        self.write_internal(SYNC_STATUS_KEY, &status);
        Some(state.status_event())
    }

    fn emit_status(&self, event: Option<SyncEvent>) {
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn evict_expired(&self, queue: &mut ChangeQueue) -> usize {
        queue.purge_synced_before(Utc::now() - self.settings.eviction_age)
    }

    fn persist_queue(&self, queue: &mut ChangeQueue) {
        let result = match self.write_queue(queue) {
            Err(e) if e.is_quota_exceeded() && self.evict_expired(queue) > 0 => {
                self.write_queue(queue)
            }
            other => other,
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist pending changes: {}", e);
        }
    }

    fn write_queue(&self, queue: &ChangeQueue) -> Result<(), BackendError> {
        let raw = serde_json::to_string(queue.as_slice()).map_err(|e| {
            BackendError::IoError(PENDING_CHANGES_KEY.into(), std::io::Error::from(e))
        })?;
        self.backend.set(PENDING_CHANGES_KEY, &raw)
    }

    fn write_internal<T: serde::Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(|e| e.to_string())
            .and_then(|raw| self.backend.set(key, &raw).map_err(|e| e.to_string()));
        if let Err(e) = result {
            tracing::warn!("Failed to persist {}: {}", key, e);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_dirty(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.dirty.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CapacityReclaimer for Synchronizer {
    fn reclaim(&self) -> usize {
        let mut state = self.lock_state();
        let evicted = self.evict_expired(&mut state.queue);
        if evicted > 0 {
            tracing::warn!("Evicted {} old synced changes to free storage", evicted);
            if let Err(e) = self.write_queue(&state.queue) {
                tracing::warn!("Failed to persist pending changes: {}", e);
            }
        }
        evicted
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
    }
}

fn read_internal<T: DeserializeOwned>(backend: &dyn KeyValueBackend, key: &str) -> Option<T> {
    let raw = match backend.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", key, e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", key, e);
            None
        }
    }
}
