//! Report management commands.
//!
//! Reports live in two category directories under the reports root:
//! `network_logs/` for request captures and `web_vitals/` for vitals samples.
//! Every command addresses a report by its path relative to that root, for
//! example `network_logs/NL_010324_09:30:00AM.csv`.

use crate::OutputFormat;
use anyhow::Result;
use console::style;
use netlog_core::{ReportCategory, ReportInfo, ReportStore};
use serde_json::json;
use std::path::Path;

/// List reports, optionally limited to one category
pub fn list(root: &Path, category: Option<ReportCategory>, format: OutputFormat) -> Result<()> {
    let store = ReportStore::new(root);
    let categories = match category {
        Some(category) => vec![category],
        None => ReportCategory::ALL.to_vec(),
    };

    let mut listing = Vec::new();
    for category in categories {
        listing.push((category, store.list(category)?));
    }

    match format {
        OutputFormat::Json => {
            let mut output = serde_json::Map::new();
            for (category, reports) in &listing {
                output.insert(category.dir_name().to_string(), serde_json::to_value(reports)?);
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Pretty => {
            for (category, reports) in &listing {
                output_listing(*category, reports);
            }
        }
    }

    Ok(())
}

fn output_listing(category: ReportCategory, reports: &[ReportInfo]) {
    println!("\n{}", style(format!("{}/", category.dir_name())).bold().cyan());

    if reports.is_empty() {
        println!("  {}", style("No reports found.").dim());
        return;
    }

    for report in reports {
        println!(
            "  {:<40} {:>6} rows {:>10.2} KB  {}",
            report.filename,
            report.rows,
            report.size_kb,
            style(&report.modified).dim()
        );
    }
}

/// Print every row of a report
pub fn show(root: &Path, relative: &str, format: OutputFormat) -> Result<()> {
    let store = ReportStore::new(root);
    let rows = store.read_rows(relative)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Pretty => {
            println!("\n{}", style(relative).bold().cyan());
            println!("{} rows", rows.len());

            for (index, row) in rows.iter().enumerate() {
                println!("\n{}", style(format!("Row {}", index + 1)).bold());
                for (column, value) in row {
                    if !value.is_empty() {
                        println!("  {:<18} {}", style(column).dim(), value);
                    }
                }
            }
        }
    }

    Ok(())
}

pub fn rename(root: &Path, relative: &str, new_name: &str, format: OutputFormat) -> Result<()> {
    let store = ReportStore::new(root);
    let new_relative = store.rename(relative, new_name)?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "old_path": relative, "new_path": new_relative }))?
            );
        }
        OutputFormat::Pretty => println!("✅ Renamed {} to {}", relative, new_relative),
    }

    Ok(())
}

pub fn delete(root: &Path, relative: &str, format: OutputFormat) -> Result<()> {
    let store = ReportStore::new(root);
    store.delete(relative)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "deleted": relative }))?);
        }
        OutputFormat::Pretty => println!("✅ Deleted {}", relative),
    }

    Ok(())
}
