//! `georescue show` command - Details and map links for one installation

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::context::AppContext;
use crate::cli::helpers::format_position;
use crate::cli::output::print_installations;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Installation;

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Installation number (exact match)
    pub number: String,
}

pub async fn run(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = AppContext::open(global).await?;
    let coordinator = ctx.search_coordinator();

    let installation = coordinator
        .find_by_number(args.number.trim())
        .await
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("Installation '{}' not found", args.number))?;

    match ctx.format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&installation).into_diagnostic()?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert("map_url".into(), installation.map_url().into());
                obj.insert("directions_url".into(), installation.directions_url().into());
            }
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        }
        OutputFormat::Csv | OutputFormat::Tsv => {
            print_installations(std::slice::from_ref(&installation), ctx.format)?;
        }
        OutputFormat::Auto => print_details(&installation),
    }

    Ok(())
}

fn print_details(inst: &Installation) {
    println!(
        "{} {}",
        style("Installation").bold(),
        style(&inst.installation_number).cyan().bold()
    );
    println!("{}", style("─".repeat(40)).dim());
    println!("  Name:       {}", non_empty(&inst.name));
    println!("  Address:    {}", inst.display_address().unwrap_or("-"));
    if !inst.street.is_empty() && inst.display_address() != Some(inst.street.as_str()) {
        println!("  Street:     {}", inst.street);
    }
    println!("  Position:   {}", format_position(inst.position()));
    if let Some(client) = inst.client_position() {
        println!("  Client pos: {}", format_position(client));
    }
    if let Some(ref created) = inst.created_at {
        println!("  Created:    {}", style(created).dim());
    }
    println!();
    println!("  Map:        {}", style(inst.map_url()).underlined());
    println!("  Directions: {}", style(inst.directions_url()).underlined());
}

fn non_empty(s: &str) -> &str {
    if s.trim().is_empty() {
        "-"
    } else {
        s
    }
}
