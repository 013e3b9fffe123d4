//! Notification channel between the synchronizer and its observers.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::state::SyncStatus;
use crate::keys::DataKey;

/// Events broadcast to listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A key was saved with a new value
    DataChanged { key: DataKey, value: Value },
    /// The sync status moved to a different state
    SyncStatusChanged {
        status: SyncStatus,
        is_online: bool,
        last_sync: Option<DateTime<Utc>>,
        pending_count: usize,
    },
    /// A sync attempt acknowledged everything it sent
    SyncCompleted {
        synced_count: usize,
        timestamp: DateTime<Utc>,
    },
    /// A sync attempt failed
    SyncFailed { error: String },
    /// Periodic auto-save: these components still hold unsaved edits
    AutoSave { dirty_components: Vec<String> },
    /// The host is shutting down; flush unsaved edits now
    Unloading,
}

pub type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Registered listeners, called in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, listener));
        id
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every listener with `event`.
    ///
    /// The list is snapshotted first, so listeners may subscribe, unsubscribe
    /// or trigger further events. A panicking listener is logged and the
    /// remaining listeners still run.
    pub fn emit(&self, event: &SyncEvent) {
        let snapshot: Vec<Listener> = self.lock().iter().map(|(_, l)| l.clone()).collect();

        for listener in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                tracing::error!(
                    "Error in data service listener: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

/// Handle returned by `add_listener`; call [`Subscription::unsubscribe`] to
/// stop receiving events.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the listener. A no-op if the registry is gone.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            registry.add(Arc::new(move |_: &SyncEvent| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        registry.emit(&SyncEvent::Unloading);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));

        registry.add(Arc::new(|_: &SyncEvent| panic!("faulty subscriber")));
        let seen_clone = seen.clone();
        registry.add(Arc::new(move |_: &SyncEvent| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        registry.emit(&SyncEvent::SyncFailed {
            error: "boom".to_string(),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = Arc::new(ListenerRegistry::new());
        let id = registry.add(Arc::new(|_: &SyncEvent| {}));
        let subscription = Subscription::new(id, &registry);
        assert_eq!(registry.len(), 1);

        subscription.unsubscribe();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_listener_may_unsubscribe_during_emit() {
        let registry = Arc::new(ListenerRegistry::new());
        let weak = Arc::downgrade(&registry);
        let id = Arc::new(AtomicU64::new(u64::MAX));

        let id_clone = id.clone();
        let assigned = registry.add(Arc::new(move |_: &SyncEvent| {
            if let Some(registry) = weak.upgrade() {
                registry.remove(id_clone.load(Ordering::SeqCst));
            }
        }));
        id.store(assigned, Ordering::SeqCst);

        registry.emit(&SyncEvent::Unloading);
        assert!(registry.is_empty());
    }
}
