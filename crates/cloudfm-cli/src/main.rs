//! cloudfm - Command-line host for the cloud file manager
//!
//! Provides commands for:
//! - Saving, exporting and opening documents on any enabled provider
//! - Reopening a saved document from its `#file=` fragment
//! - Browsing provider folders
//! - Signing in to Google Drive
//! - Viewing and editing the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod host;
mod output;

use commands::{
    auth::AuthCommand,
    completions::CompletionsCommand,
    config::ConfigCommand,
    document::{
        ExportCommand, ImportCommand, OpenCommand, RemoveCommand, RenameCommand, RestoreCommand,
        SaveCommand,
    },
    list::ListCommand,
    providers::ProvidersCommand,
};
use context::{load_config, AppContext};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "cloudfm",
    version,
    about = "Save and open documents in local and cloud storage"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Answer yes to overwrite and delete confirmations
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the enabled providers and their capabilities
    Providers(ProvidersCommand),
    /// List a provider folder
    #[command(alias = "ls")]
    List(ListCommand),
    /// Save a document
    Save(SaveCommand),
    /// Export a copy of a document
    Export(ExportCommand),
    /// Open a document
    Open(OpenCommand),
    /// Reopen a saved document from its `#file=` fragment
    Restore(RestoreCommand),
    /// Import a document from a URL
    Import(ImportCommand),
    /// Rename a document
    Rename(RenameCommand),
    /// Delete a document
    #[command(alias = "rm")]
    Remove(RemoveCommand),
    /// Google Drive authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// `-v` wins over the configured level; `RUST_LOG` wins over both
fn env_filter(verbose: u8, configured: &str) -> EnvFilter {
    let level = match verbose {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(cloudfm_core::config::Config::default_path);
    let configured_level = load_config(&config_path)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "warn".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.verbose, &configured_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let fmt = get_formatter(format, cli.quiet);

    // Commands that never touch a provider run without building one.
    match &cli.command {
        Commands::Config(cmd) => return cmd.execute(&config_path, format, fmt.as_ref()).await,
        Commands::Completions(cmd) => return cmd.execute(),
        _ => {}
    }

    let ctx = AppContext::load(Some(&config_path), cli.yes).await?;
    let fmt = fmt.as_ref();
    let result = match cli.command {
        Commands::Providers(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::List(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::Save(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::Export(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::Open(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::Restore(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::Import(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::Rename(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::Remove(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::Auth(cmd) => cmd.execute(&ctx, format, fmt).await,
        Commands::Config(_) | Commands::Completions(_) => Ok(()),
    };

    if let Err(e) = &result {
        fmt.error(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}
