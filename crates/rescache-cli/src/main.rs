//! Rescache CLI
//!
//! Keeps a SQLite cache of brushes, palettes and other resources in sync
//! with the folders and bundles they come from.

use anyhow::Result;
use clap::Parser;
use rescache_core::error::exit_codes;
use rescache_core::{Config, Database, ResCacheError};
use std::path::PathBuf;
use std::process::ExitCode;

mod app;
mod commands;

use app::{Cli, Commands};

/// Everything a command needs
pub struct Context {
    pub db: Database,
    pub config: Config,
    pub config_path: PathBuf,
    pub cache_dir: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<ResCacheError>()
                .map(ResCacheError::exit_code)
                .unwrap_or(exit_codes::GENERAL_ERROR);
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_from(&config_path)?;
    let registry = config.registry()?;

    // RESCACHE_CACHE_DIR wins over the config file
    let cache_dir = config.cache_location();
    let db = Database::initialize(&cache_dir, &registry)?;

    let mut ctx = Context {
        db,
        config,
        config_path,
        cache_dir,
    };

    match cli.command {
        Commands::Init => commands::init::run(&ctx, cli.format),
        Commands::Sync => commands::sync::run(&ctx, cli.format),
        Commands::Add(args) => commands::storage::add(args, &mut ctx, cli.format),
        Commands::Remove(args) => commands::storage::remove(args, &mut ctx),
        Commands::Storages => commands::storage::list(&ctx, cli.format),
        Commands::Ls(args) => commands::ls::run(args, &ctx, cli.format),
        Commands::Versions(args) => commands::ls::versions(args, &ctx, cli.format),
        Commands::Status => commands::status::run(&ctx, cli.format),
    }
}
