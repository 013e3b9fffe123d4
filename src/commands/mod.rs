mod config_cmd;
mod data;
mod export;
mod import;
mod session;
mod sync_cmd;

use clap::ValueEnum;

pub use config_cmd::ConfigCommand;
pub use data::DataCommand;
pub use export::ExportCommand;
pub use import::ImportCommand;
pub use session::SessionCommand;
pub use sync_cmd::SyncCommand;

#[derive(Debug, Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
