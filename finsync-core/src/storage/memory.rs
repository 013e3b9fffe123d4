//! In-memory key-value backend.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::{BackendError, KeyValueBackend};

/// In-process backend, optionally bounded by a total byte capacity.
///
/// The capacity counts key and value bytes, like browser local storage
/// quotas do. A write that would exceed it fails with
/// [`BackendError::QuotaExceeded`] and leaves the map untouched.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryBackend {
    /// Creates an unbounded backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding at most `bytes` of keys plus values.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            capacity: Some(bytes),
        }
    }

    /// Total bytes currently used.
    pub fn used_bytes(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(capacity) = self.capacity {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > capacity {
                return Err(BackendError::QuotaExceeded(key.to_string()));
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_returns_none() {
        let backend = MemoryBackend::new();
        assert!(backend.get("userGoals").unwrap().is_none());
    }

    #[test]
    fn test_set_replaces_value() {
        let backend = MemoryBackend::new();
        backend.set("userGoals", "1").unwrap();
        backend.set("userGoals", "2").unwrap();
        assert_eq!(backend.get("userGoals").unwrap().as_deref(), Some("2"));
        assert_eq!(backend.keys().unwrap(), vec!["userGoals".to_string()]);
    }

    #[test]
    fn test_remove() {
        let backend = MemoryBackend::new();
        backend.set("a", "1").unwrap();
        backend.remove("a").unwrap();
        backend.remove("a").unwrap();
        assert!(backend.get("a").unwrap().is_none());
    }

    #[test]
    fn test_capacity_rejects_oversized_write() {
        let backend = MemoryBackend::with_capacity(10);
        backend.set("a", "12345").unwrap();

        let err = backend.set("b", "123456789").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert!(backend.get("b").unwrap().is_none());
        assert_eq!(backend.used_bytes(), 6);
    }

    #[test]
    fn test_capacity_counts_replacement_once() {
        let backend = MemoryBackend::with_capacity(10);
        backend.set("a", "123456789").unwrap();
        // Replacing "a" frees its old value first.
        backend.set("a", "987654321").unwrap();
        assert_eq!(backend.get("a").unwrap().as_deref(), Some("987654321"));
    }
}
