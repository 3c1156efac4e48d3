//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rescache")]
#[command(
    author,
    version,
    about = "Persistent cache of versioned, tagged brushes, palettes and other resources"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file
    #[arg(long, global = true, env = "RESCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or verify the cache
    Init,

    /// Synchronize every configured storage and prune removed ones
    Sync,

    /// Add a folder or bundle storage and synchronize it
    Add(AddArgs),

    /// Remove a storage and the resources it provides
    #[command(alias = "rm")]
    Remove(RemoveArgs),

    /// List storages
    Storages,

    /// List the current resources of a type
    Ls(LsArgs),

    /// Show the version history of a resource
    Versions(VersionsArgs),

    /// Show cache status
    Status,
}

#[derive(Args)]
pub struct AddArgs {
    /// Folder, or .bundle/.zip file
    pub path: PathBuf,

    /// Mark the storage as shipped with the application
    #[arg(long)]
    pub pre_installed: bool,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Location the storage was added with
    pub path: PathBuf,
}

#[derive(Args)]
pub struct LsArgs {
    /// Resource type, e.g. brushes
    pub resource_type: String,
}

#[derive(Args)]
pub struct VersionsArgs {
    /// Resource type, e.g. brushes
    pub resource_type: String,

    /// Resource file name
    pub filename: String,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
}
