//! Show command

use super::action_index;
use crate::app::{ActionArgs, OutputFormat};
use crate::output::{json, terminal};
use anyhow::Result;
use vaultkeeper_core::{Analysis, Config, Database};

pub fn run(args: ActionArgs, db: &Database, config: &Config, format: OutputFormat) -> Result<()> {
    let plan = Analysis::run(db, config)?.plan;
    let action = plan.action(action_index(args.number)?)?;

    match format {
        OutputFormat::Json => print!("{}", json::to_json(action)),
        _ => terminal::write_action(&mut terminal::stdout(), args.number, action)?,
    }
    Ok(())
}
