use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# finsync configuration

# Directory holding the stored data, one JSON file per key
# (default: platform data dir, e.g. ~/.local/share/finsync)
# data_dir: ~/.local/share/finsync

sync:
  # Push pending changes after write commands
  auto_sync: true
  # Start disconnected; changes queue locally until a sync while online
  offline: false
  # Give up on a sync attempt after this many seconds
  timeout_secs: 15
  auto_save_interval_secs: 30
  # Latency range of the simulated server
  latency_ms:
    min: 1000
    max: 3000

binding:
  debounce_ms: 1000
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => print!("{}", render_text(config)),
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = config
                    .config_file
                    .clone()
                    .unwrap_or_else(Config::default_config_path);

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'finsync config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

fn render_text(config: &Config) -> String {
    let mut out = String::from("Configuration\n=============\n\n");

    match &config.config_file {
        Some(path) => out.push_str(&format!("Config file: {}\n\n", path.display())),
        None => out.push_str(&format!(
            "Config file: {} (not found)\n\n",
            Config::default_config_path().display()
        )),
    }

    out.push_str(&format!("data_dir: {}\n", config.data_dir.value.display()));
    out.push_str(&format!("  source: {}\n\n", config.data_dir.source));

    out.push_str(&format!("offline: {}\n", config.offline.value));
    out.push_str(&format!("  source: {}\n\n", config.offline.source));

    out.push_str(&format!(
        "sync.timeout_secs: {}\n",
        config.sync_timeout_secs.value
    ));
    out.push_str(&format!("  source: {}\n\n", config.sync_timeout_secs.source));

    out.push_str(&format!("sync.auto_sync: {}\n", config.sync.auto_sync));
    out.push_str(&format!(
        "sync.auto_save_interval_secs: {}\n",
        config.sync.auto_save_interval_secs
    ));
    out.push_str(&format!(
        "sync.latency_ms: {}-{}\n",
        config.sync.latency_ms.min, config.sync.latency_ms.max
    ));
    out.push_str(&format!("binding.debounce_ms: {}\n", config.binding.debounce_ms));
    out
}
