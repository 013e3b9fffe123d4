use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A versioned value persisted under a logical key.
///
/// This is the exact shape written to the backend:
/// `{"data": ..., "version": ..., "lastModified": ..., "changeId": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub data: Value,
    pub version: i64,
    pub last_modified: DateTime<Utc>,
    pub change_id: String,
}

impl Entry {
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            version: self.version,
            last_modified: self.last_modified,
            change_id: self.change_id.clone(),
        }
    }
}

/// Version metadata of an entry, without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    pub version: i64,
    pub last_modified: DateTime<Utc>,
    pub change_id: String,
}

/// What a successful save hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub change_id: String,
    pub version: i64,
}

/// Raw stored record, before legacy upgrade.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoredValue {
    /// Enveloped entry with version metadata.
    Entry(Entry),
    /// Bare payload written before entries carried metadata.
    Legacy(Value),
}

/// Picks the next version for a key.
///
/// Versions follow the wall clock in milliseconds but never repeat or go
/// backwards for one key: a collision or clock step yields `previous + 1`.
pub(crate) fn next_version(previous: Option<i64>, now_millis: i64) -> i64 {
    match previous {
        Some(prev) if prev >= now_millis => prev + 1,
        _ => now_millis.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_wire_format() {
        let entry = Entry {
            data: json!([{"id": 1, "target": 100}]),
            version: 42,
            last_modified: "2026-01-02T03:04:05Z".parse().unwrap(),
            change_id: "abc".to_string(),
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["version"], 42);
        assert_eq!(value["changeId"], "abc");
        assert_eq!(value["lastModified"], "2026-01-02T03:04:05Z");
        assert_eq!(value["data"][0]["target"], 100);
    }

    #[test]
    fn test_next_version_follows_clock() {
        assert_eq!(next_version(None, 1_000), 1_000);
        assert_eq!(next_version(Some(900), 1_000), 1_000);
    }

    #[test]
    fn test_next_version_breaks_ties() {
        assert_eq!(next_version(Some(1_000), 1_000), 1_001);
        // Clock went backwards.
        assert_eq!(next_version(Some(5_000), 1_000), 5_001);
    }

    #[test]
    fn test_next_version_is_positive() {
        assert_eq!(next_version(None, 0), 1);
    }
}
