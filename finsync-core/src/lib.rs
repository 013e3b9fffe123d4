//! Finsync Core Library
//!
//! Local persistence and sync for personal-finance data: a versioned
//! key-value store, a queue of pending changes, an online/offline sync
//! state machine and debounced per-component bindings.

pub mod binding;
pub mod keys;
pub mod models;
pub mod service;
pub mod storage;
pub mod store;
pub mod sync;

pub use binding::{Binding, BindingOptions, KeyStatus, MultiBinding};
pub use keys::DataKey;
pub use models::{
    Budget, BudgetType, Document, FamilyMember, Goal, Investment, MemberRole, RecordId, Settings,
    SharedBudget, Subscription, Transaction, TransactionKind,
};
pub use service::{DataService, ExportBundle, ImportReport, SaveOptions};
pub use storage::{BackendError, FileBackend, KeyValueBackend, MemoryBackend};
pub use store::{Entry, EntryMeta, SaveReceipt, Store, StoreError};
pub use sync::{
    NoticeKind, Notifier, PendingChange, RemoteError, RemoteSync, SimulatedRemote, SyncError,
    SyncEvent, SyncInfo, SyncSettings, SyncStatus, Synchronizer, TracingNotifier,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
