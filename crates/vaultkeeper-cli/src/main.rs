//! Vaultkeeper CLI
//!
//! Ownership audit and safe cleanup planner for game server databases.

use anyhow::{Context, Result};
use clap::Parser;
use vaultkeeper_core::error::exit_codes;
use vaultkeeper_core::{Config, Database, VaultkeeperError};

mod app;
mod commands;
mod output;

use app::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<VaultkeeperError>()
            .map(|e| e.exit_code())
            .unwrap_or(exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db_path = cli.db.clone().ok_or_else(|| {
        VaultkeeperError::InvalidInput(
            "no database given; pass --db or set VAULTKEEPER_DB".to_string(),
        )
    })?;
    let db = Database::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;

    match cli.command {
        Commands::Analyze => commands::analyze::run(&db, &config, cli.format),
        Commands::Plan => commands::plan::run(&db, &config, cli.format),
        Commands::Show(args) => commands::show::run(args, &db, &config, cli.format),
        Commands::Execute(args) => commands::execute::run(args, &db, config, cli.format),
        Commands::ExportSql(args) => commands::export::run_sql(args, &db, &config),
        Commands::Export(args) => commands::export::run_csv(args, &db, &config),
        Commands::Vacuum => commands::vacuum::run(&db, cli.format),
    }
}
