//! The seam where queued changes leave the device.

use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::error::RemoteError;
use super::queue::PendingChange;

/// Ids of the changes the remote confirmed.
pub type Acknowledged = HashSet<String>;

/// Delivers pending changes to a remote finance API.
///
/// Implementations return the ids they accepted. Ids not returned stay
/// queued and are sent again on the next attempt.
pub trait RemoteSync: Send + Sync {
    fn push<'a>(
        &'a self,
        changes: &'a [PendingChange],
    ) -> BoxFuture<'a, Result<Acknowledged, RemoteError>>;
}

/// Stand-in remote that waits a random latency and accepts every change.
#[derive(Debug)]
pub struct SimulatedRemote {
    min_latency: Duration,
    max_latency: Duration,
    failure: Mutex<Option<RemoteError>>,
    pushed: Mutex<Vec<String>>,
}

impl SimulatedRemote {
    pub fn new(min_latency: Duration, max_latency: Duration) -> Self {
        Self {
            min_latency,
            max_latency: max_latency.max(min_latency),
            failure: Mutex::new(None),
            pushed: Mutex::new(Vec::new()),
        }
    }

    /// A remote that answers without delay.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Makes every following push fail with `error`.
    pub fn fail_with(&self, error: RemoteError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Clears an injected failure.
    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Ids of every change accepted so far, in arrival order.
    pub fn pushed(&self) -> Vec<String> {
        self.pushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn pick_latency(&self) -> Duration {
        if self.max_latency.is_zero() {
            return Duration::ZERO;
        }
        let min = self.min_latency.as_millis() as u64;
        let max = self.max_latency.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

impl Default for SimulatedRemote {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(3000))
    }
}

impl RemoteSync for SimulatedRemote {
    fn push<'a>(
        &'a self,
        changes: &'a [PendingChange],
    ) -> BoxFuture<'a, Result<Acknowledged, RemoteError>> {
        let latency = self.pick_latency();

        async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            if let Some(error) = self
                .failure
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
            {
                return Err(error);
            }

            let ids: Vec<String> = changes.iter().map(|c| c.id.clone()).collect();
            self.pushed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(ids.iter().cloned());

            Ok(ids.into_iter().collect())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::DataKey;
    use crate::store::Entry;
    use chrono::Utc;
    use serde_json::json;

    fn change(id: &str) -> PendingChange {
        PendingChange::new(
            DataKey::Budgets,
            Entry {
                data: json!([]),
                version: 1,
                last_modified: Utc::now(),
                change_id: id.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_acknowledges_every_change() {
        let remote = SimulatedRemote::instant();
        let changes = vec![change("a"), change("b")];

        let acked = remote.push(&changes).await.unwrap();

        assert_eq!(acked.len(), 2);
        assert!(acked.contains("a") && acked.contains("b"));
        assert_eq!(remote.pushed(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failure_and_recovery() {
        let remote = SimulatedRemote::instant();
        let changes = vec![change("a")];

        remote.fail_with(RemoteError::Unreachable("no route".into()));
        assert!(remote.push(&changes).await.is_err());
        assert!(remote.pushed().is_empty());

        remote.recover();
        assert!(remote.push(&changes).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_within_bounds() {
        let remote = SimulatedRemote::new(Duration::from_millis(1000), Duration::from_millis(3000));
        let start = tokio::time::Instant::now();

        remote.push(&[change("a")]).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed <= Duration::from_millis(3001));
    }
}
