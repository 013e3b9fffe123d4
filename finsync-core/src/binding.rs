//! Per-component views over one stored key.
//!
//! A [`Binding`] holds the in-memory value a component edits. Edits are
//! applied immediately in memory and written through the [`DataService`]
//! after a debounce window, so a burst of edits costs one write. Unsaved
//! edits are flushed when the service unloads, when the auto-save tick
//! names the component, and when the binding is dropped.
//!
//! While a binding holds unsaved edits it ignores `DataChanged` for its key.
//! Once clean, an incoming value replaces the local one.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::keys::DataKey;
use crate::models::Document;
use crate::service::{decode_stored, DataService, SaveOptions};
use crate::store::{EntryMeta, SaveReceipt, StoreError};
use crate::sync::{Subscription, SyncEvent};

/// Default debounce window for [`Binding::update`].
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct BindingOptions {
    /// Name reported in the dirty set; generated when empty
    pub component_id: String,
    pub debounce: Duration,
    /// Schedule a debounced save on every update
    pub auto_save: bool,
    /// Sync right after each save when online
    pub sync_immediately: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            component_id: String::new(),
            debounce: DEFAULT_DEBOUNCE,
            auto_save: true,
            sync_immediately: false,
        }
    }
}

impl BindingOptions {
    pub fn component(id: impl Into<String>) -> Self {
        Self {
            component_id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

struct BindingState<T> {
    value: T,
    has_unsaved_changes: bool,
    is_saving: bool,
    last_saved_at: Option<DateTime<Utc>>,
    /// Bumped on every local edit
    revision: u64,
}

struct Shared<T> {
    service: Arc<DataService>,
    key: DataKey,
    default: T,
    options: BindingOptions,
    state: Mutex<BindingState<T>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Value of one key as seen by one component.
pub struct Binding<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    shared: Arc<Shared<T>>,
    subscription: Option<Subscription>,
}

impl<T> Binding<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Loads `key` (or `default` when absent) and starts listening for
    /// changes.
    ///
    /// Fails with [`StoreError::MalformedStoredData`] when the stored value
    /// does not decode as `T`; the stored data is left untouched.
    pub fn new(
        service: Arc<DataService>,
        key: DataKey,
        default: T,
        mut options: BindingOptions,
    ) -> Result<Self, StoreError> {
        if options.component_id.is_empty() {
            options.component_id = format!("{}:{}", key.storage_key(), Uuid::new_v4());
        }

        let value = load_value(&service, key, &default)?;
        let shared = Arc::new(Shared {
            service,
            key,
            default,
            options,
            state: Mutex::new(BindingState {
                value,
                has_unsaved_changes: false,
                is_saving: false,
                last_saved_at: None,
                revision: 0,
            }),
            timer: Mutex::new(None),
        });

        let weak = Arc::downgrade(&shared);
        let subscription = shared.service.add_listener(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.on_event(event);
            }
        });

        Ok(Self {
            shared,
            subscription: Some(subscription),
        })
    }

    pub fn key(&self) -> DataKey {
        self.shared.key
    }

    pub fn component_id(&self) -> &str {
        &self.shared.options.component_id
    }

    pub fn value(&self) -> T {
        self.shared.lock_state().value.clone()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.shared.lock_state().has_unsaved_changes
    }

    pub fn is_saving(&self) -> bool {
        self.shared.lock_state().is_saving
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.shared.lock_state().last_saved_at
    }

    pub fn meta(&self) -> Option<EntryMeta> {
        self.shared.service.get_meta(self.shared.key)
    }

    /// Replaces the value in memory and schedules a debounced save.
    ///
    /// A later update inside the window restarts it; the save writes
    /// whatever value is current when the window closes.
    pub fn update(&self, value: T) {
        self.shared.set_local(value);
        if self.shared.options.auto_save {
            Shared::schedule_save(&self.shared);
        }
    }

    /// Replaces the value and saves it now, bypassing the debounce.
    pub async fn update_immediate(&self, value: T) -> Result<SaveReceipt, StoreError> {
        self.shared.set_local(value);
        self.shared.cancel_timer();
        self.shared.save().await
    }

    /// Cancels any pending debounce, saves now and syncs if online.
    pub async fn force_save(&self) -> Result<SaveReceipt, StoreError> {
        self.shared.cancel_timer();
        let receipt = self.shared.write(false)?;
        let sync = self.shared.service.synchronizer();
        if sync.is_online() {
            if let Err(e) = sync.sync().await {
                tracing::warn!("Sync after saving {} failed: {}", self.shared.key, e);
            }
        }
        Ok(receipt)
    }

    /// Discards local edits and re-reads the stored value.
    ///
    /// If the stored value no longer decodes, the local state is kept and
    /// the error returned.
    pub fn reload(&self) -> Result<(), StoreError> {
        let value = load_value(&self.shared.service, self.shared.key, &self.shared.default)?;
        self.shared.cancel_timer();
        {
            let mut state = self.shared.lock_state();
            state.value = value;
            state.has_unsaved_changes = false;
            state.revision += 1;
        }
        self.shared.mark_clean();
        Ok(())
    }

    /// Cancels the debounce, flushes unsaved edits and stops listening.
    /// Dropping the binding does the same.
    pub fn dispose(&mut self) {
        let Some(subscription) = self.subscription.take() else {
            return;
        };
        self.shared.cancel_timer();
        self.shared.flush(true);
        self.shared.mark_clean();
        subscription.unsubscribe();
    }
}

impl<T: Document> Binding<T> {
    /// Binds the key a document type is stored under.
    pub fn for_document(
        service: Arc<DataService>,
        options: BindingOptions,
    ) -> Result<Self, StoreError> {
        Self::new(service, T::KEY, T::default(), options)
    }
}

impl<T> Drop for Binding<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> Shared<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, BindingState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_local(&self, value: T) {
        {
            let mut state = self.lock_state();
            state.value = value;
            state.has_unsaved_changes = true;
            state.revision += 1;
        }
        self.service
            .synchronizer()
            .mark_dirty(&self.options.component_id);
    }

    fn mark_clean(&self) {
        self.service
            .synchronizer()
            .mark_clean(&self.options.component_id);
    }

    fn schedule_save(this: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime for a debounced save of {}; saving now", this.key);
            this.flush(false);
            return;
        };

        let weak: Weak<Self> = Arc::downgrade(this);
        let debounce = this.options.debounce;
        let task = handle.spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(shared) = weak.upgrade() {
                if !shared.lock_state().has_unsaved_changes {
                    return;
                }
                if let Err(e) = shared.save().await {
                    tracing::error!("Debounced save of {} failed: {}", shared.key, e);
                }
            }
        });

        let previous = this.lock_timer().replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn cancel_timer(&self) {
        if let Some(task) = self.lock_timer().take() {
            task.abort();
        }
    }

    /// Writes the current value, then syncs if configured to.
    async fn save(&self) -> Result<SaveReceipt, StoreError> {
        let receipt = self.write(false)?;
        if self.options.sync_immediately {
            let sync = self.service.synchronizer();
            if sync.is_online() {
                if let Err(e) = sync.sync().await {
                    tracing::warn!("Sync after saving {} failed: {}", self.key, e);
                }
            }
        }
        Ok(receipt)
    }

    /// Saves now if there are unsaved edits, superseding any pending
    /// debounce. Errors are logged. Teardown flushes pass `silent` so other
    /// views are not told about a page closing.
    fn flush(&self, silent: bool) {
        if !self.lock_state().has_unsaved_changes {
            return;
        }
        self.cancel_timer();
        if let Err(e) = self.write(silent) {
            tracing::error!("Failed to flush unsaved {}: {}", self.key, e);
        }
    }

    /// Synchronously writes the current value through the service.
    ///
    /// The edit is only marked clean if no newer edit arrived while the
    /// write was in progress. On failure the in-memory value is kept.
    fn write(&self, silent: bool) -> Result<SaveReceipt, StoreError> {
        let (value, revision) = {
            let mut state = self.lock_state();
            state.is_saving = true;
            (state.value.clone(), state.revision)
        };

        let result = serde_json::to_value(&value)
            .map_err(StoreError::from)
            .and_then(|value| self.service.persist(self.key, value, silent));

        let clean = {
            let mut state = self.lock_state();
            state.is_saving = false;
            if result.is_ok() {
                state.last_saved_at = Some(Utc::now());
                if state.revision == revision {
                    state.has_unsaved_changes = false;
                }
            }
            !state.has_unsaved_changes
        };

        if clean {
            self.mark_clean();
        }
        result
    }

    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::DataChanged { key, value } if *key == self.key => {
                self.apply_external(value);
            }
            SyncEvent::AutoSave { dirty_components }
                if dirty_components.contains(&self.options.component_id) =>
            {
                self.flush(false);
            }
            SyncEvent::Unloading => self.flush(true),
            SyncEvent::SyncCompleted { timestamp, .. } => {
                self.lock_state().last_saved_at = Some(*timestamp);
            }
            _ => {}
        }
    }

    fn apply_external(&self, value: &Value) {
        let mut state = self.lock_state();
        if state.has_unsaved_changes {
            tracing::debug!("Ignoring external change to {}: local edits pending", self.key);
            return;
        }
        match serde_json::from_value::<T>(value.clone()) {
            Ok(value) => state.value = value,
            Err(e) => tracing::warn!("Ignoring external change to {}: {}", self.key, e),
        }
    }
}

fn load_value<T>(service: &DataService, key: DataKey, default: &T) -> Result<T, StoreError>
where
    T: DeserializeOwned + Clone,
{
    decode_stored(key, service.load(key, Value::Null), || default.clone())
}

/// Save status of one key in a [`MultiBinding`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStatus {
    pub is_saving: bool,
    pub has_unsaved_changes: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
}

struct KeySlot {
    value: Value,
    status: KeyStatus,
    revision: u64,
}

/// Several keys edited together, saved explicitly rather than debounced.
pub struct MultiBinding {
    service: Arc<DataService>,
    sync_immediately: bool,
    slots: Mutex<BTreeMap<DataKey, KeySlot>>,
}

impl MultiBinding {
    /// Loads each key, falling back to its default.
    pub fn new(service: Arc<DataService>, defaults: Vec<(DataKey, Value)>) -> Self {
        let slots = defaults
            .into_iter()
            .map(|(key, default)| {
                let slot = KeySlot {
                    value: service.load(key, default),
                    status: KeyStatus::default(),
                    revision: 0,
                };
                (key, slot)
            })
            .collect();

        Self {
            service,
            sync_immediately: false,
            slots: Mutex::new(slots),
        }
    }

    pub fn with_sync_immediately(mut self, sync_immediately: bool) -> Self {
        self.sync_immediately = sync_immediately;
        self
    }

    pub fn keys(&self) -> Vec<DataKey> {
        self.lock().keys().copied().collect()
    }

    pub fn value(&self, key: DataKey) -> Option<Value> {
        self.lock().get(&key).map(|slot| slot.value.clone())
    }

    pub fn status(&self, key: DataKey) -> Option<KeyStatus> {
        self.lock().get(&key).map(|slot| slot.status.clone())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.lock().values().any(|slot| slot.status.has_unsaved_changes)
    }

    /// Replaces a key's value in memory and marks it unsaved. Keys not yet
    /// held are added.
    pub fn update_key(&self, key: DataKey, value: Value) {
        let mut slots = self.lock();
        let slot = slots.entry(key).or_insert_with(|| KeySlot {
            value: Value::Null,
            status: KeyStatus::default(),
            revision: 0,
        });
        slot.value = value;
        slot.status.has_unsaved_changes = true;
        slot.revision += 1;
    }

    pub async fn update_key_immediate(
        &self,
        key: DataKey,
        value: Value,
    ) -> Result<SaveReceipt, StoreError> {
        self.update_key(key, value);
        self.save_key(key).await
    }

    /// Saves one key's current value.
    pub async fn save_key(&self, key: DataKey) -> Result<SaveReceipt, StoreError> {
        let (value, revision) = {
            let mut slots = self.lock();
            let slot = slots.get_mut(&key).ok_or_else(|| {
                StoreError::InvalidFormat(format!("{} is not part of this binding", key))
            })?;
            slot.status.is_saving = true;
            (slot.value.clone(), slot.revision)
        };

        let options = SaveOptions {
            sync_immediately: self.sync_immediately,
            silent: false,
        };
        let result = self.service.save(key, value, options).await;

        if let Some(slot) = self.lock().get_mut(&key) {
            slot.status.is_saving = false;
            if result.is_ok() {
                slot.status.last_saved_at = Some(Utc::now());
                if slot.revision == revision {
                    slot.status.has_unsaved_changes = false;
                }
            }
        }
        result
    }

    /// Saves every key with unsaved changes and reports each outcome.
    pub async fn save_all(&self) -> Vec<(DataKey, Result<SaveReceipt, StoreError>)> {
        let unsaved: Vec<DataKey> = self
            .lock()
            .iter()
            .filter(|(_, slot)| slot.status.has_unsaved_changes)
            .map(|(key, _)| *key)
            .collect();

        let mut results = Vec::with_capacity(unsaved.len());
        for key in unsaved {
            let result = self.save_key(key).await;
            results.push((key, result));
        }
        results
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<DataKey, KeySlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Goal;
    use serde_json::json;

    fn service() -> Arc<DataService> {
        Arc::new(DataService::in_memory())
    }

    fn count_writes(service: &DataService, key: DataKey) -> Arc<Mutex<Vec<Value>>> {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let sink = writes.clone();
        service.add_listener(move |event| {
            if let SyncEvent::DataChanged { key: k, value } = event {
                if *k == key {
                    sink.lock().unwrap().push(value.clone());
                }
            }
        });
        writes
    }

    #[tokio::test]
    async fn test_loads_stored_value_or_default() {
        let service = service();
        service.persist(DataKey::Goals, json!([1, 2]), false).unwrap();

        let stored: Binding<Vec<i32>> =
            Binding::new(service.clone(), DataKey::Goals, vec![], BindingOptions::default()).unwrap();
        let missing: Binding<Vec<i32>> =
            Binding::new(service, DataKey::Budgets, vec![9], BindingOptions::default()).unwrap();

        assert_eq!(stored.value(), vec![1, 2]);
        assert_eq!(missing.value(), vec![9]);
        assert!(!stored.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_collapses_rapid_updates() {
        let service = service();
        let writes = count_writes(&service, DataKey::Goals);
        let binding: Binding<Vec<i32>> = Binding::new(
            service.clone(),
            DataKey::Goals,
            vec![],
            BindingOptions::component("goals-page"),
        ).unwrap();

        for i in 1..=5 {
            binding.update(vec![i]);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(writes.lock().unwrap().is_empty());
        assert!(binding.has_unsaved_changes());
        assert!(service.synchronizer().is_dirty("goals-page"));

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(*writes.lock().unwrap(), vec![json!([5])]);
        assert_eq!(service.load(DataKey::Goals, json!(null)), json!([5]));
        assert!(!binding.has_unsaved_changes());
        assert!(!service.synchronizer().is_dirty("goals-page"));
        assert!(binding.last_saved_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_flushes_pending_edit() {
        let service = service();
        let binding: Binding<Vec<i32>> =
            Binding::new(service.clone(), DataKey::Budgets, vec![], BindingOptions::default()).unwrap();

        binding.update(vec![42]);
        service.unload();

        assert_eq!(service.load(DataKey::Budgets, json!(null)), json!([42]));
        assert!(!binding.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_flushes_and_unsubscribes() {
        let service = service();
        let listeners_before = service.synchronizer().listener_count();
        let binding: Binding<Vec<i32>> = Binding::new(
            service.clone(),
            DataKey::Budgets,
            vec![],
            BindingOptions::component("budget-page"),
        ).unwrap();
        assert_eq!(service.synchronizer().listener_count(), listeners_before + 1);

        binding.update(vec![7]);
        drop(binding);

        assert_eq!(service.load(DataKey::Budgets, json!(null)), json!([7]));
        assert_eq!(service.synchronizer().listener_count(), listeners_before);
        assert!(!service.synchronizer().is_dirty("budget-page"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_edits_win_while_unsaved() {
        let service = service();
        let binding: Binding<Vec<i32>> =
            Binding::new(service.clone(), DataKey::Goals, vec![], BindingOptions::default()).unwrap();

        binding.update(vec![1]);
        service.persist(DataKey::Goals, json!([99]), false).unwrap();
        assert_eq!(binding.value(), vec![1]);

        binding.force_save().await.unwrap();
        service.persist(DataKey::Goals, json!([100]), false).unwrap();
        assert_eq!(binding.value(), vec![100]);
    }

    #[tokio::test]
    async fn test_update_immediate_saves_now() {
        let service = service();
        let binding: Binding<Vec<i32>> =
            Binding::new(service.clone(), DataKey::Goals, vec![], BindingOptions::default()).unwrap();

        let receipt = binding.update_immediate(vec![3]).await.unwrap();

        assert_eq!(binding.meta().unwrap().version, receipt.version);
        assert_eq!(service.load(DataKey::Goals, json!(null)), json!([3]));
        assert!(!binding.has_unsaved_changes());
        assert!(!binding.is_saving());
    }

    #[tokio::test]
    async fn test_force_save_syncs_when_online() {
        let service = service();
        let binding: Binding<Vec<i32>> =
            Binding::new(service.clone(), DataKey::Goals, vec![], BindingOptions::default()).unwrap();

        binding.update(vec![1]);
        binding.force_save().await.unwrap();

        assert_eq!(service.get_sync_info().pending_changes, 0);
        assert!(service.get_sync_info().last_sync.is_some());
    }

    #[tokio::test]
    async fn test_auto_save_tick_flushes_named_component() {
        let service = service();
        let binding: Binding<Vec<i32>> = Binding::new(
            service.clone(),
            DataKey::Subscriptions,
            vec![],
            BindingOptions {
                auto_save: false,
                ..BindingOptions::component("subscriptions-page")
            },
        ).unwrap();

        binding.update(vec![5]);
        assert_eq!(service.load(DataKey::Subscriptions, json!(null)), json!(null));

        service.synchronizer().auto_save_tick();

        assert_eq!(service.load(DataKey::Subscriptions, json!(null)), json!([5]));
        assert!(!binding.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_reload_discards_local_edits() {
        let service = service();
        service.persist(DataKey::Goals, json!([1]), false).unwrap();
        let binding: Binding<Vec<i32>> = Binding::new(
            service.clone(),
            DataKey::Goals,
            vec![],
            BindingOptions {
                auto_save: false,
                ..Default::default()
            },
        ).unwrap();

        binding.update(vec![2]);
        binding.reload().unwrap();

        assert_eq!(binding.value(), vec![1]);
        assert!(!binding.has_unsaved_changes());
    }

    #[tokio::test]
    async fn test_document_binding() {
        let service = service();
        let binding = Binding::<Vec<Goal>>::for_document(service.clone(), BindingOptions::default()).unwrap();
        assert_eq!(binding.key(), DataKey::Goals);

        binding
            .update_immediate(vec![Goal::new(1, "Car", 5000.0)])
            .await
            .unwrap();

        assert_eq!(service.load_document::<Vec<Goal>>().unwrap()[0].name, "Car");
    }

    #[tokio::test]
    async fn test_mismatched_stored_data_is_not_replaced() {
        let service = service();
        let stored = json!([{"id": 1, "name": "Car", "target": "5000"}]);
        service.persist(DataKey::Goals, stored.clone(), false).unwrap();

        let result = Binding::<Vec<Goal>>::for_document(service.clone(), BindingOptions::default());

        assert!(matches!(
            result,
            Err(StoreError::MalformedStoredData {
                key: DataKey::Goals,
                ..
            })
        ));
        assert_eq!(service.load(DataKey::Goals, json!(null)), stored);
        assert_eq!(service.synchronizer().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_reload_keeps_local_value_when_stored_data_no_longer_decodes() {
        let service = service();
        let binding: Binding<Vec<i32>> = Binding::new(
            service.clone(),
            DataKey::Goals,
            vec![],
            BindingOptions {
                auto_save: false,
                ..Default::default()
            },
        )
        .unwrap();
        binding.update(vec![4]);
        service.persist(DataKey::Goals, json!("not a list"), true).unwrap();

        assert!(binding.reload().is_err());
        assert_eq!(binding.value(), vec![4]);
        assert!(binding.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_flushes_are_silent() {
        let service = service();
        let writes = count_writes(&service, DataKey::Budgets);
        let binding: Binding<Vec<i32>> =
            Binding::new(service.clone(), DataKey::Budgets, vec![], BindingOptions::default())
                .unwrap();

        binding.update(vec![1]);
        service.unload();
        binding.update(vec![2]);
        drop(binding);

        assert!(writes.lock().unwrap().is_empty());
        assert_eq!(service.load(DataKey::Budgets, json!(null)), json!([2]));
        assert_eq!(service.get_sync_info().pending_changes, 2);
    }

    #[test]
    fn test_update_without_runtime_saves_synchronously() {
        let service = service();
        let binding: Binding<Vec<i32>> =
            Binding::new(service.clone(), DataKey::Goals, vec![], BindingOptions::default()).unwrap();

        binding.update(vec![8]);

        assert_eq!(service.load(DataKey::Goals, json!(null)), json!([8]));
    }

    #[tokio::test]
    async fn test_multi_binding_saves_only_unsaved_keys() {
        let service = service();
        let writes = count_writes(&service, DataKey::Budgets);
        let multi = MultiBinding::new(
            service.clone(),
            vec![(DataKey::Goals, json!([])), (DataKey::Budgets, json!([]))],
        );

        multi.update_key(DataKey::Goals, json!([1]));
        assert!(multi.has_unsaved_changes());
        assert!(multi.status(DataKey::Goals).unwrap().has_unsaved_changes);
        assert_eq!(service.load(DataKey::Goals, json!(null)), json!(null));

        let results = multi.save_all().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, DataKey::Goals);
        assert!(results[0].1.is_ok());
        assert!(writes.lock().unwrap().is_empty());
        assert_eq!(service.load(DataKey::Goals, json!(null)), json!([1]));

        let status = multi.status(DataKey::Goals).unwrap();
        assert!(!status.has_unsaved_changes);
        assert!(status.last_saved_at.is_some());
    }

    #[tokio::test]
    async fn test_multi_binding_update_key_immediate() {
        let service = service();
        let multi = MultiBinding::new(service.clone(), vec![(DataKey::Settings, json!({}))])
            .with_sync_immediately(true);

        multi
            .update_key_immediate(DataKey::Settings, json!({"preferences": {"darkMode": true}}))
            .await
            .unwrap();

        assert_eq!(
            service.load(DataKey::Settings, json!({}))["preferences"]["darkMode"],
            true
        );
        assert_eq!(service.get_sync_info().pending_changes, 0);
        assert!(multi.save_key(DataKey::Investments).await.is_err());
    }
}
