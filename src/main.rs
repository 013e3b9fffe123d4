use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod sync;

use commands::{
    ConfigCommand, DataCommand, ExportCommand, ImportCommand, SessionCommand, SyncCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "finsync")]
#[command(version)]
#[command(about = "Offline-first storage and sync for personal finance data", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Run disconnected; changes stay queued locally
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and write stored keys
    Data(DataCommand),

    /// Write a backup of every stored key
    Export(ExportCommand),

    /// Restore keys from a backup file
    Import(ImportCommand),

    /// Push pending changes to the server
    Sync(SyncCommand),

    /// Edit data interactively with debounced saves
    Session(SessionCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

impl Commands {
    fn is_write(&self) -> bool {
        match self {
            Commands::Data(cmd) => cmd.is_write(),
            Commands::Import(_) | Commands::Session(_) => true,
            Commands::Export(_) | Commands::Sync(_) | Commands::Config(_) => false,
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FINSYNC_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "finsync=warn,finsync_core=warn".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config)?;
    if cli.offline {
        config.force_offline();
    }

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    if let Commands::Config(cmd) = &command {
        return cmd.run(&config);
    }

    let service = Arc::new(sync::open_service(&config));
    let result: Result<(), Box<dyn std::error::Error>> = match &command {
        Commands::Data(cmd) => cmd.run(&service).await.map_err(Into::into),
        Commands::Export(cmd) => cmd.run(&service),
        Commands::Import(cmd) => cmd.run(&service).await,
        Commands::Sync(cmd) => cmd.run(&service).await.map_err(Into::into),
        Commands::Session(cmd) => cmd.run(service.clone(), &config).await,
        Commands::Config(_) => Ok(()),
    };

    if result.is_ok() && command.is_write() {
        sync::try_auto_sync(&service, &config).await;
    }
    service.dispose();

    result
}
