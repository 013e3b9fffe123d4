//! Sync CLI commands.

use chrono::Utc;
use clap::{Args, Subcommand};

use finsync_core::{DataService, SyncError};

use super::OutputFormat;

/// Push pending changes to the server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show connectivity, last sync and pending changes
    Status {
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List queued changes
    Pending,
}

impl SyncCommand {
    pub async fn run(&self, service: &DataService) -> Result<(), SyncCommandError> {
        match &self.command {
            None => self.sync(service).await,
            Some(SyncSubcommand::Status { format }) => self.status(service, format),
            Some(SyncSubcommand::Pending) => {
                self.pending(service);
                Ok(())
            }
        }
    }

    async fn sync(&self, service: &DataService) -> Result<(), SyncCommandError> {
        let pending = service.get_sync_info().pending_changes;
        if pending == 0 && service.synchronizer().is_online() {
            println!("Already up to date.");
            return Ok(());
        }

        println!("Syncing {} change{}...", pending, plural(pending));
        let count = service.force_sync_now().await?;
        println!("✓ {} change{} synced", count, plural(count));
        Ok(())
    }

    fn status(&self, service: &DataService, format: &OutputFormat) -> Result<(), SyncCommandError> {
        let info = service.get_sync_info();

        match format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&info)
                    .map_err(|e| SyncCommandError::Output(e.to_string()))?;
                println!("{}", json);
            }
            OutputFormat::Text => {
                println!("Sync Status");
                println!("===========");
                println!();
                println!("Status:    {}", info.summary());
                println!(
                    "Connected: {}",
                    if info.is_online { "online" } else { "offline" }
                );
                println!("Last sync: {}", info.last_sync_ago(Utc::now()));
                println!("Pending:   {}", info.pending_changes);
                println!("Queued:    {}", info.total_changes);
            }
        }
        Ok(())
    }

    fn pending(&self, service: &DataService) {
        let changes = service.synchronizer().pending_changes();
        let unsynced: Vec<_> = changes.iter().filter(|c| !c.synced).collect();

        if unsynced.is_empty() {
            println!("No pending changes.");
            return;
        }
        for change in unsynced {
            println!(
                "{}  {:<15} {}",
                change.enqueued_at.to_rfc3339(),
                change.key.name(),
                change.id
            );
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    SyncError(SyncError),
    Output(String),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::SyncError(SyncError::Offline) => write!(
                f,
                "Cannot sync while offline. Changes stay queued until you sync online."
            ),
            SyncCommandError::SyncError(e) => write!(f, "{}", e),
            SyncCommandError::Output(e) => write!(f, "Failed to render output: {}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::SyncError(e) => Some(e),
            SyncCommandError::Output(_) => None,
        }
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::SyncError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsync_core::{DataKey, SaveOptions, SyncStatus};
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_pushes_pending_changes() {
        let service = DataService::in_memory();
        service
            .save(DataKey::Goals, json!([]), SaveOptions::default())
            .await
            .unwrap();

        let cmd = SyncCommand { command: None };
        cmd.run(&service).await.unwrap();

        let info = service.get_sync_info();
        assert_eq!(info.pending_changes, 0);
        assert_eq!(info.status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_sync_offline_fails() {
        let service = DataService::in_memory();
        service.synchronizer().set_online(false).await;

        let cmd = SyncCommand { command: None };
        let err = cmd.run(&service).await.unwrap_err();
        assert!(err.to_string().starts_with("Cannot sync while offline"));
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1), "");
        assert_eq!(plural(0), "s");
        assert_eq!(plural(3), "s");
    }
}
