//! Execute command
//!
//! Drives the confirmation sequence. Tokens come from flags or, when
//! omitted, from stdin.

use super::action_index;
use crate::app::{ExecuteArgs, OutputFormat};
use crate::output::{json, terminal};
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use vaultkeeper_core::{
    Analysis, CleanupSession, Config, Database, BACKUP_TOKEN, EXECUTE_TOKEN,
};

fn prompt(message: &str) -> Result<String> {
    eprint!("{}: ", message);
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading confirmation")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub fn run(args: ExecuteArgs, db: &Database, mut config: Config, format: OutputFormat) -> Result<()> {
    if args.vacuum {
        config.execution.vacuum_after = true;
    }

    let plan = Analysis::run(db, &config)?.plan;
    let mut session = CleanupSession::new(plan);
    let action = session.select(action_index(args.number)?)?;

    if format == OutputFormat::Cli {
        let mut err = termcolor::StandardStream::stderr(termcolor::ColorChoice::Auto);
        terminal::write_action(&mut err, args.number, action)?;
        eprintln!();
    }

    let backup = match args.backup_token {
        Some(token) => token,
        None => prompt(&format!("Type '{}' once the database is backed up", BACKUP_TOKEN))?,
    };
    session.confirm_backup(&backup)?;

    let execute = match args.execute_token {
        Some(token) => token,
        None => prompt(&format!("Type '{}' to delete the rows", EXECUTE_TOKEN))?,
    };
    session.confirm_execute(&execute)?;

    let outcome = session.run(db, &config)?;

    match format {
        OutputFormat::Json => print!("{}", json::to_json(&outcome)),
        _ => terminal::write_outcome(&mut terminal::stdout(), &outcome)?,
    }
    Ok(())
}
