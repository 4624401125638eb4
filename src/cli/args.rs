//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    cache::CacheCommands, completions::CompletionsArgs, search::SearchArgs, show::ShowArgs,
    sync::SyncArgs,
};

#[derive(Parser)]
#[command(name = "georescue")]
#[command(author, version, about = "Offline-first lookup of utility installations")]
#[command(long_about = "Search utility installations by number, name or address. \
The full record set is mirrored into a local cache so lookups keep working without a connection.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format [default: `default_format` from the config file, else auto]
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Never contact the backend; answer from the local cache only
    #[arg(long, global = true)]
    pub offline: bool,

    /// Cache database location (default: platform data dir)
    #[arg(long, global = true, env = "GEORESCUE_CACHE")]
    pub cache: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the full installation set into the local cache
    Sync(SyncArgs),

    /// Search installations by number, name or address
    Search(SearchArgs),

    /// Show one installation with map links
    Show(ShowArgs),

    /// Inspect or reset the local cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable tables and details
    #[default]
    Auto,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
}
