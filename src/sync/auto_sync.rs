//! Auto-sync after write commands.

use finsync_core::{DataService, SyncError};

use crate::config::Config;

/// Pushes pending changes if `auto_sync` is enabled and the host is online.
///
/// Failures are reported but never fail the command: the changes stay
/// queued and go out with the next sync.
pub async fn try_auto_sync(service: &DataService, config: &Config) {
    if !config.sync.auto_sync || !service.synchronizer().is_online() {
        return;
    }
    if service.get_sync_info().pending_changes == 0 {
        return;
    }

    match service.force_sync_now().await {
        Ok(count) => tracing::debug!("Auto-sync pushed {} changes", count),
        Err(SyncError::Offline) => {}
        Err(e) => eprintln!("Auto-sync: {}", e),
    }
}
