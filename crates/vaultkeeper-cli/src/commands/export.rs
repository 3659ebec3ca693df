//! Export commands

use super::action_index;
use crate::app::{ExportArgs, ExportKind, ExportSqlArgs};
use anyhow::Result;
use std::fs::File;
use std::io;
use vaultkeeper_core::cleanup::{script_file_name, write_script};
use vaultkeeper_core::export::{write_affected_csv, write_orphans_csv};
use vaultkeeper_core::{Analysis, Config, Database};

pub fn run_sql(args: ExportSqlArgs, db: &Database, config: &Config) -> Result<()> {
    let plan = Analysis::run(db, config)?.plan;
    let action = plan.action(action_index(args.number)?)?;

    let path = args
        .output
        .unwrap_or_else(|| script_file_name(args.number, action, plan.generated_at).into());
    let written = write_script(action, plan.generated_at, &path)?;

    println!("Wrote {}", written.display());
    if !action.is_executable() || plan.is_blocked() {
        eprintln!("This action must not be run; the statement is commented out.");
    }
    Ok(())
}

pub fn run_csv(args: ExportArgs, db: &Database, config: &Config) -> Result<()> {
    let analysis = Analysis::run(db, config)?;

    let out: Box<dyn io::Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };

    match args.what {
        ExportKind::Orphans => write_orphans_csv(out, &analysis.forensics.orphaned_owners)?,
        ExportKind::Affected => write_affected_csv(out, &analysis.damage.affected)?,
    }

    if let Some(path) = &args.output {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}
