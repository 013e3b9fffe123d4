//! Change queue, sync state machine and notifications.
//!
//! Every successful save is queued as a [`PendingChange`]. The
//! [`Synchronizer`] pushes unsynced changes through a [`RemoteSync`] seam
//! whenever it is online and tracks the result as a [`SyncStatus`]:
//!
//! ```text
//! offline --(reconnect)--> syncing --(all acked)--> synced
//!                             |
//!                             +--(failure/timeout)--> error --(retry)--> syncing
//! any state --(connectivity lost)--> offline
//! ```
//!
//! Observers subscribe with [`Synchronizer::add_listener`] and receive
//! [`SyncEvent`]s.

mod error;
mod events;
mod host;
mod queue;
mod remote;
mod state;
mod synchronizer;

pub use error::{RemoteError, SyncError};
pub use events::{Listener, ListenerRegistry, Subscription, SyncEvent};
pub use host::{NoticeKind, Notifier, TracingNotifier};
pub use queue::{ChangeAction, ChangeQueue, PendingChange};
pub use remote::{Acknowledged, RemoteSync, SimulatedRemote};
pub use state::{SyncInfo, SyncSettings, SyncStatus};
pub use synchronizer::Synchronizer;
