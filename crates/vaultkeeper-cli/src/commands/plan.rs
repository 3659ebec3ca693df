//! Plan command

use crate::app::OutputFormat;
use crate::output::{csv, json, terminal};
use anyhow::Result;
use vaultkeeper_core::{Analysis, Config, Database};

pub fn run(db: &Database, config: &Config, format: OutputFormat) -> Result<()> {
    let plan = Analysis::run(db, config)?.plan;

    match format {
        OutputFormat::Json => print!("{}", json::to_json(&plan)),
        OutputFormat::Csv => print!("{}", csv::format_plan(&plan)),
        OutputFormat::Cli => terminal::write_plan(&mut terminal::stdout(), &plan)?,
    }
    Ok(())
}
