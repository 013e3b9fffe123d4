//! Queue of changes awaiting acknowledgement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::keys::DataKey;
use crate::store::Entry;

/// Kind of mutation recorded in the queue. Deletion is not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Update,
}

/// A saved entry that has not been confirmed by the remote yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Same as the entry's change id
    pub id: String,
    pub key: DataKey,
    pub action: ChangeAction,
    /// The entry as it was written
    pub snapshot: Entry,
    pub enqueued_at: DateTime<Utc>,
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl PendingChange {
    pub fn new(key: DataKey, snapshot: Entry) -> Self {
        Self {
            id: snapshot.change_id.clone(),
            key,
            action: ChangeAction::Update,
            snapshot,
            enqueued_at: Utc::now(),
            synced: false,
            synced_at: None,
        }
    }
}

/// Ordered queue of pending changes.
///
/// Changes keep their enqueue order. Acknowledgements are applied by id, so
/// a remote may confirm them in any order or only partially.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeQueue {
    changes: Vec<PendingChange>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_changes(changes: Vec<PendingChange>) -> Self {
        Self { changes }
    }

    pub fn push(&mut self, change: PendingChange) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn as_slice(&self) -> &[PendingChange] {
        &self.changes
    }

    /// Number of changes not yet acknowledged.
    pub fn pending_count(&self) -> usize {
        self.changes.iter().filter(|c| !c.synced).count()
    }

    /// Clones the unacknowledged changes, in enqueue order.
    pub fn unsynced(&self) -> Vec<PendingChange> {
        self.changes.iter().filter(|c| !c.synced).cloned().collect()
    }

    /// Marks the listed unsynced changes as synced.
    ///
    /// Returns how many changes flipped to synced. Unknown ids and changes
    /// already synced are ignored.
    pub fn mark_synced(&mut self, ids: &HashSet<String>, at: DateTime<Utc>) -> usize {
        let mut marked = 0;
        for change in self.changes.iter_mut() {
            if !change.synced && ids.contains(&change.id) {
                change.synced = true;
                change.synced_at = Some(at);
                marked += 1;
            }
        }
        marked
    }

    /// Drops synced changes enqueued at or before `cutoff`.
    ///
    /// Unsynced changes are never dropped. Returns the number removed.
    pub fn purge_synced_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.changes.len();
        self.changes
            .retain(|c| !c.synced || c.enqueued_at > cutoff);
        before - self.changes.len()
    }
}
