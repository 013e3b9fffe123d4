//! Wiring between the CLI and the core data service.
//!
//! The CLI is a short-lived host: it opens the service over the data
//! directory, runs one command and disposes it. Notices go to stderr.

pub mod auto_sync;
pub mod notifier;

use std::sync::Arc;

use finsync_core::{DataService, FileBackend, SimulatedRemote, Synchronizer};

use crate::config::Config;

pub use auto_sync::try_auto_sync;
pub use notifier::ConsoleNotifier;

/// Opens the data service described by `config`.
pub fn open_service(config: &Config) -> DataService {
    let backend = Arc::new(FileBackend::new(config.data_dir.value.clone()));
    let (min, max) = config.latency();
    let remote = Arc::new(SimulatedRemote::new(min, max));

    let sync = Synchronizer::new(
        backend.clone(),
        remote,
        config.sync_settings(),
        !config.offline.value,
    )
    .with_notifier(Arc::new(ConsoleNotifier));

    tracing::debug!(
        data_dir = %config.data_dir.value.display(),
        offline = config.offline.value,
        "Opened data service"
    );
    DataService::from_parts(backend, sync)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsync_core::{DataKey, SaveOptions, SyncStatus};
    use serde_json::json;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path, offline: bool) -> Config {
        let path = dir.join("config.yaml");
        let yaml = format!(
            "data_dir: data\nsync:\n  offline: {}\n  latency_ms:\n    min: 0\n    max: 0\n",
            offline
        );
        std::fs::write(&path, yaml).unwrap();
        Config::load(Some(path)).unwrap()
    }

    #[tokio::test]
    async fn test_open_service_persists_across_instances() {
        let temp_dir = tempdir().unwrap();
        let config = test_config(temp_dir.path(), true);

        let service = open_service(&config);
        service
            .save(DataKey::Goals, json!([{"id": 1}]), SaveOptions::default())
            .await
            .unwrap();
        assert_eq!(service.get_sync_info().status, SyncStatus::Offline);
        service.dispose();

        let reopened = open_service(&config);
        assert_eq!(reopened.load(DataKey::Goals, json!([])), json!([{"id": 1}]));
        assert_eq!(reopened.get_sync_info().pending_changes, 1);
    }

    #[tokio::test]
    async fn test_open_service_online_syncs() {
        let temp_dir = tempdir().unwrap();
        let config = test_config(temp_dir.path(), false);

        let service = open_service(&config);
        service
            .save(DataKey::Budgets, json!([]), SaveOptions::immediate())
            .await
            .unwrap();

        let info = service.get_sync_info();
        assert_eq!(info.status, SyncStatus::Synced);
        assert_eq!(info.pending_changes, 0);
    }
}
