//! Analyze command

use crate::app::OutputFormat;
use crate::output::{csv, json, terminal};
use anyhow::Result;
use vaultkeeper_core::{Analysis, Config, Database};

pub fn run(db: &Database, config: &Config, format: OutputFormat) -> Result<()> {
    let analysis = Analysis::run(db, config)?;

    match format {
        OutputFormat::Json => print!("{}", json::to_json(&analysis)),
        OutputFormat::Csv => print!("{}", csv::format_classification(&analysis.classification)),
        OutputFormat::Cli => terminal::write_analysis(&mut terminal::stdout(), &analysis)?,
    }
    Ok(())
}
