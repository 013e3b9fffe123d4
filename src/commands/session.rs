//! Interactive session: edits go through debounced bindings while the
//! auto-save ticker and the connectivity watcher run in the background.

use chrono::Utc;
use clap::Args;
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use finsync_core::{Binding, BindingOptions, DataKey, DataService, SyncEvent};

use crate::config::Config;

const HELP: &str = "\
Commands:
  edit <KEY> <JSON>   change a key (saved after the debounce window)
  show <KEY>          print the current value of a key
  online | offline    simulate a connectivity change
  sync                push pending changes now
  status              show sync status
  help                show this help
  quit                flush unsaved edits and exit";

/// Edit data interactively with debounced saves
#[derive(Args)]
pub struct SessionCommand {
    /// Debounce window in milliseconds (default: binding.debounce_ms)
    #[arg(long)]
    debounce_ms: Option<u64>,
}

#[derive(Debug, PartialEq)]
enum SessionInput {
    Edit(DataKey, Value),
    Show(DataKey),
    Connectivity(bool),
    Sync,
    Status,
    Help,
    Quit,
}

impl SessionCommand {
    pub async fn run(
        &self,
        service: Arc<DataService>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let debounce = Duration::from_millis(self.debounce_ms.unwrap_or(config.binding.debounce_ms));
        let (connectivity, rx) = watch::channel(!config.offline.value);
        service.init(rx);

        let subscription = service.add_listener(|event: &SyncEvent| {
            if let Some(line) = render_event(event) {
                eprintln!("{}", line);
            }
        });

        let mut bindings: BTreeMap<DataKey, Binding<Value>> = BTreeMap::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", HELP);

        while let Some(line) = lines.next_line().await? {
            let input = match parse_line(&line) {
                Ok(Some(input)) => input,
                Ok(None) => continue,
                Err(e) => {
                    eprintln!("{}", e);
                    continue;
                }
            };

            match input {
                SessionInput::Edit(key, value) => {
                    let binding = match bindings.entry(key) {
                        Entry::Occupied(slot) => slot.into_mut(),
                        Entry::Vacant(slot) => {
                            let options =
                                BindingOptions::component(format!("session-{}", key.storage_key()))
                                    .with_debounce(debounce);
                            match Binding::new(service.clone(), key, Value::Null, options) {
                                Ok(binding) => slot.insert(binding),
                                Err(e) => {
                                    eprintln!("{}", e);
                                    continue;
                                }
                            }
                        }
                    };
                    binding.update(value);
                }
                SessionInput::Show(key) => {
                    let value = match bindings.get(&key) {
                        Some(binding) => binding.value(),
                        None => service.load(key, Value::Null),
                    };
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                SessionInput::Connectivity(online) => {
                    connectivity.send_replace(online);
                }
                SessionInput::Sync => match service.force_sync_now().await {
                    Ok(count) => println!("✓ {} change(s) synced", count),
                    Err(e) => eprintln!("{}", e),
                },
                SessionInput::Status => {
                    let info = service.get_sync_info();
                    println!("{} (last sync: {})", info.summary(), info.last_sync_ago(Utc::now()));
                }
                SessionInput::Help => println!("{}", HELP),
                SessionInput::Quit => break,
            }
        }

        service.unload();
        drop(bindings);
        subscription.unsubscribe();
        Ok(())
    }
}

fn parse_line(line: &str) -> Result<Option<SessionInput>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let key = |raw: &str| DataKey::parse(raw).ok_or_else(|| format!("Unknown key '{}'", raw));

    let input = match command {
        "edit" => {
            let (raw_key, json) = rest
                .split_once(char::is_whitespace)
                .ok_or("Usage: edit <KEY> <JSON>")?;
            let value = serde_json::from_str(json.trim())
                .map_err(|e| format!("Invalid JSON value: {}", e))?;
            SessionInput::Edit(key(raw_key)?, value)
        }
        "show" => SessionInput::Show(key(rest)?),
        "online" => SessionInput::Connectivity(true),
        "offline" => SessionInput::Connectivity(false),
        "sync" => SessionInput::Sync,
        "status" => SessionInput::Status,
        "help" | "?" => SessionInput::Help,
        "quit" | "exit" => SessionInput::Quit,
        other => return Err(format!("Unknown command '{}'. Type 'help'.", other)),
    };
    Ok(Some(input))
}

fn render_event(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::DataChanged { key, .. } => Some(format!("[saved] {}", key)),
        SyncEvent::SyncStatusChanged {
            status,
            pending_count,
            ..
        } => Some(format!("[status] {} ({} pending)", status, pending_count)),
        SyncEvent::SyncCompleted { synced_count, .. } => {
            Some(format!("[synced] {} change(s)", synced_count))
        }
        SyncEvent::SyncFailed { error } => Some(format!("[sync failed] {}", error)),
        SyncEvent::AutoSave { dirty_components } if !dirty_components.is_empty() => Some(
            format!("[auto-save] {}", dirty_components.join(", ")),
        ),
        SyncEvent::AutoSave { .. } | SyncEvent::Unloading => None,
    }
}
