//! `georescue search` command - Find installations by number, name or address
//!
//! Queries go to the backend when it is reachable and to the local cache
//! otherwise. Matching ignores case and accents.

use console::style;
use miette::Result;

use crate::cli::context::AppContext;
use crate::cli::output::print_installations;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::SearchField;

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Search term (at least two characters)
    pub query: String,

    /// Field to match against
    #[arg(long, value_enum, default_value_t = SearchField::InstallationNumber)]
    pub field: SearchField,

    /// Limit number of results (never more than the configured cap)
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,

    /// Show only count
    #[arg(long)]
    pub count: bool,
}

/// Run the search command
pub async fn run(args: SearchArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = AppContext::open(global).await?;
    let coordinator = ctx.search_coordinator();
    let min_len = coordinator.settings().min_query_len;

    let mut results = coordinator
        .search(&args.query, args.field)
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    if let Some(limit) = args.limit {
        results.truncate(limit);
    }

    if args.count {
        println!("{}", results.len());
        return Ok(());
    }

    if results.is_empty() && ctx.format == OutputFormat::Auto {
        if !global.quiet {
            if args.query.chars().count() < min_len {
                println!(
                    "Query too short: type at least {} characters.",
                    style(min_len).cyan()
                );
            } else {
                println!(
                    "No installations found for '{}'.",
                    style(&args.query).yellow()
                );
            }
        }
        return Ok(());
    }

    print_installations(&results, ctx.format)?;

    if ctx.format == OutputFormat::Auto && !global.quiet {
        let source = if ctx.is_online() { "backend" } else { "local cache" };
        println!();
        println!(
            "{} result(s) by {} from {}",
            style(results.len()).cyan(),
            args.field,
            style(source).dim()
        );
    }

    Ok(())
}
