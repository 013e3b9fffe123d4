//! Sync status and settings.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Connectivity and sync status of the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Disconnected; writes stay local
    Offline,
    /// A sync attempt is in flight
    Syncing,
    /// The last attempt acknowledged everything it sent
    Synced,
    /// The last attempt failed; changes stay queued for retry
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Offline => write!(f, "offline"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of the sync state, for status indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInfo {
    pub status: SyncStatus,
    pub is_online: bool,
    pub last_sync: Option<DateTime<Utc>>,
    /// Changes not yet acknowledged
    pub pending_changes: usize,
    /// All changes still held in the queue, synced or not
    pub total_changes: usize,
}

impl SyncInfo {
    /// Human-readable status line.
    pub fn summary(&self) -> String {
        match self.status {
            SyncStatus::Synced if self.pending_changes > 0 => {
                format!("{} changes pending", self.pending_changes)
            }
            SyncStatus::Synced => "All data synced".to_string(),
            SyncStatus::Syncing => "Syncing data...".to_string(),
            SyncStatus::Offline if self.pending_changes > 0 => {
                format!("Offline • {} pending", self.pending_changes)
            }
            SyncStatus::Offline => "Offline".to_string(),
            SyncStatus::Error => "Sync error - retry with a forced sync".to_string(),
        }
    }

    /// Relative age of the last successful sync ("5m ago").
    pub fn last_sync_ago(&self, now: DateTime<Utc>) -> String {
        let Some(last) = self.last_sync else {
            return "Never synced".to_string();
        };

        let elapsed = now - last;
        if elapsed < TimeDelta::minutes(1) {
            "Just now".to_string()
        } else if elapsed < TimeDelta::hours(1) {
            format!("{}m ago", elapsed.num_minutes())
        } else if elapsed < TimeDelta::days(1) {
            format!("{}h ago", elapsed.num_hours())
        } else {
            format!("{}d ago", elapsed.num_days())
        }
    }
}

/// Tunables for the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Upper bound on one remote exchange
    pub sync_timeout: Duration,
    /// Period of the auto-save tick
    pub auto_save_interval: Duration,
    /// Synced changes older than this are purged after a sync
    pub retention: TimeDelta,
    /// Synced changes older than this are dropped when storage is full
    pub eviction_age: TimeDelta,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::from_secs(15),
            auto_save_interval: Duration::from_secs(30),
            retention: TimeDelta::hours(24),
            eviction_age: TimeDelta::days(7),
        }
    }
}
