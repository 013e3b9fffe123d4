//! Versioned local persistence.
//!
//! Every save wraps the payload in an [`Entry`] envelope stamped with a
//! per-key monotonic version, an RFC 3339 timestamp and a unique change id.
//! Values written before envelopes existed are still readable and are
//! upgraded the first time they are loaded.

mod entry;
mod error;
mod local_store;

pub use entry::{Entry, EntryMeta, SaveReceipt};
pub use error::StoreError;
pub use local_store::{CapacityReclaimer, Store};
