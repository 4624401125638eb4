//! `georescue sync` command - Refresh the local cache from the backend
//!
//! A sync downloads every installation and replaces the cache contents in a
//! single transaction. If anything fails, the previous cache stays intact.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use miette::{IntoDiagnostic, Result};

use crate::cli::context::AppContext;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{AutoSync, SkipReason, SyncError, SyncPhase, SyncReport};

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Only sync when the cache is empty or older than the staleness threshold
    #[arg(long)]
    pub if_stale: bool,
}

pub async fn run(args: SyncArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = AppContext::open(global).await?;
    let orchestrator = ctx.sync_orchestrator();

    let bar = if global.quiet || ctx.format != OutputFormat::Auto {
        ProgressBar::hidden()
    } else {
        progress_bar()?
    };

    let mut status = orchestrator.subscribe();
    let progress = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let snapshot = status.borrow_and_update().clone();
                bar.set_position(u64::from(snapshot.progress));
                if snapshot.phase == SyncPhase::Syncing && snapshot.progress >= 90 {
                    bar.set_message("writing cache");
                }
            }
        })
    };

    let outcome = if args.if_stale {
        orchestrator.activate().await
    } else {
        match orchestrator.sync().await {
            Ok(report) => AutoSync::Synced(report),
            Err(e) => AutoSync::Failed(e),
        }
    };

    progress.abort();
    bar.finish_and_clear();

    match outcome {
        AutoSync::Synced(report) => print_report(&report, ctx.format, global.quiet),
        AutoSync::Skipped(reason) => {
            if !global.quiet {
                let why = match reason {
                    SkipReason::Fresh => "cache is up to date",
                    SkipReason::Offline => "offline",
                    SkipReason::AlreadyActivated => "already checked",
                };
                println!("{} Sync skipped ({})", style("•").dim(), why);
            }
            Ok(())
        }
        AutoSync::Failed(SyncError::Offline) => Err(miette::miette!(
            help = "connect to the network or configure GEORESCUE_URL and GEORESCUE_API_KEY",
            "Cannot sync while offline"
        )),
        AutoSync::Failed(e) => Err(miette::miette!("Sync failed: {}", e)),
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .into_diagnostic()?
            .progress_chars("#>-"),
    );
    bar.set_message("downloading");
    Ok(bar)
}

fn print_report(report: &SyncReport, format: OutputFormat, quiet: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report).into_diagnostic()?;
            println!("{}", json);
        }
        _ if quiet => {}
        _ => {
            println!(
                "{} Synced {} installations in {}ms",
                style("✓").green(),
                style(report.inserted).cyan(),
                report.duration_ms
            );
            if report.fetched != report.inserted {
                println!(
                    "  {} {} received, {} stored",
                    style("!").yellow(),
                    report.fetched,
                    report.inserted
                );
            }
        }
    }
    Ok(())
}
