//! `georescue cache` command - Inspect or reset the local cache
//!
//! The cache is a local SQLite database holding:
//! - Every installation from the last successful sync
//! - When that sync finished and how many records it wrote
//!
//! It is derived data: clearing it only means the next lookup offline finds
//! nothing until `georescue sync` runs again.

use chrono::Utc;
use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::helpers::{format_age, format_local};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{needs_sync, CacheStats};

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics and freshness
    Status,

    /// Remove all cached installations and sync metadata
    Clear,

    /// Print the cache database location
    Path,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    path: String,
    #[serde(flatten)]
    stats: &'a CacheStats,
    stale: bool,
    online: bool,
}

pub async fn run(cmd: CacheCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CacheCommands::Status => run_status(&AppContext::open(global).await?),
        CacheCommands::Clear => run_clear(&AppContext::open_local(global).await?, global),
        CacheCommands::Path => {
            let ctx = AppContext::open_local(global).await?;
            println!("{}", ctx.cache_path.display());
            Ok(())
        }
    }
}

fn run_status(ctx: &AppContext) -> Result<()> {
    let stats = ctx.cache.get_stats().into_diagnostic()?;
    let now = Utc::now();
    let threshold = ctx.config.sync_settings().staleness_threshold;
    let stale = needs_sync(&stats, now, threshold);

    match ctx.format {
        OutputFormat::Json => {
            let report = StatusReport {
                path: ctx.cache_path.display().to_string(),
                stats: &stats,
                stale,
                online: ctx.is_online(),
            };
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }
        OutputFormat::Tsv | OutputFormat::Csv => {
            let sep = if ctx.format == OutputFormat::Csv { "," } else { "\t" };
            let last_sync = stats.last_sync.map(|t| t.to_rfc3339()).unwrap_or_default();
            println!("{}", ["count", "last_sync", "last_sync_count", "stale", "online"].join(sep));
            println!(
                "{}",
                [
                    stats.count.to_string(),
                    last_sync,
                    stats.last_sync_count.to_string(),
                    stale.to_string(),
                    ctx.is_online().to_string(),
                ]
                .join(sep)
            );
        }
        OutputFormat::Auto => {
            println!("{}", style("Cache Status").bold());
            println!("{}", style("─".repeat(40)).dim());
            println!("  Location:      {}", ctx.cache_path.display());
            println!("  Installations: {}", style(stats.count).cyan());
            match (stats.last_sync, stats.age(now)) {
                (Some(ts), Some(age)) => println!(
                    "  Last sync:     {} ({}, {} records)",
                    format_local(&ts),
                    format_age(age),
                    stats.last_sync_count
                ),
                _ => println!("  Last sync:     {}", style("never").yellow()),
            }
            let freshness = if stale {
                style("stale").yellow()
            } else {
                style("fresh").green()
            };
            println!("  Freshness:     {}", freshness);
            let connectivity = if ctx.is_online() {
                style("online").green()
            } else {
                style("offline").dim()
            };
            println!("  Backend:       {}", connectivity);
        }
    }

    Ok(())
}

fn run_clear(ctx: &AppContext, global: &GlobalOpts) -> Result<()> {
    let count = ctx.cache.get_stats().into_diagnostic()?.count;
    ctx.cache.clear().into_diagnostic()?;
    if !global.quiet {
        println!(
            "{} Cache cleared ({} installations removed)",
            style("✓").green(),
            count
        );
    }
    Ok(())
}
