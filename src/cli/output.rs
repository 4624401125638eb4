//! Rendering installation lists in the supported output formats

use std::io::{self, Write};

use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{truncate_str, tsv_cell};
use crate::cli::OutputFormat;
use crate::core::Installation;

const COLUMNS: [&str; 5] = ["number", "name", "address", "lat", "lng"];

/// Write `records` to stdout in `format`
pub fn print_installations(records: &[Installation], format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(records).into_diagnostic()?;
            writeln!(out, "{}", json).into_diagnostic()?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(COLUMNS).into_diagnostic()?;
            for r in records {
                writer.write_record(row(r)).into_diagnostic()?;
            }
            writer.flush().into_diagnostic()?;
        }
        OutputFormat::Tsv => {
            writeln!(out, "{}", COLUMNS.join("\t")).into_diagnostic()?;
            for r in records {
                let cells: Vec<String> = row(r).iter().map(|c| tsv_cell(c)).collect();
                writeln!(out, "{}", cells.join("\t")).into_diagnostic()?;
            }
        }
        OutputFormat::Auto => {
            let mut builder = Builder::default();
            builder.push_record(["Number", "Name", "Address", "Lat", "Lng"]);
            for r in records {
                builder.push_record([
                    r.installation_number.clone(),
                    truncate_str(&r.name, 32),
                    truncate_str(r.display_address().unwrap_or("-"), 40),
                    format!("{:.6}", r.pee_lat),
                    format!("{:.6}", r.pee_lng),
                ]);
            }
            writeln!(out, "{}", builder.build().with(Style::markdown())).into_diagnostic()?;
        }
    }

    Ok(())
}

fn row(r: &Installation) -> [String; 5] {
    [
        r.installation_number.clone(),
        r.name.clone(),
        r.display_address().unwrap_or_default().to_string(),
        r.pee_lat.to_string(),
        r.pee_lng.to_string(),
    ]
}
