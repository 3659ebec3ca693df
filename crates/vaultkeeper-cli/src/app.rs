//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vaultkeeper")]
#[command(
    author,
    version,
    about = "Ownership audit and safe cleanup planner for game server databases"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Game database file
    #[arg(long, global = true, env = "VAULTKEEPER_DB")]
    pub db: Option<PathBuf>,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Full ownership and damage report
    Analyze,

    /// List the cleanup actions for the current database
    Plan,

    /// Show one action in detail, including its statement
    Show(ActionArgs),

    /// Run a cleanup action after two confirmations
    Execute(ExecuteArgs),

    /// Write an action to a SQL script for manual review
    ExportSql(ExportSqlArgs),

    /// Export orphaned owners or affected players as CSV
    Export(ExportArgs),

    /// Reclaim free pages
    Vacuum,
}

#[derive(Args)]
pub struct ActionArgs {
    /// Action number as listed by `plan`
    pub number: usize,
}

#[derive(Args)]
pub struct ExecuteArgs {
    /// Action number as listed by `plan`
    pub number: usize,

    /// Backup confirmation token; prompted for when omitted
    #[arg(long)]
    pub backup_token: Option<String>,

    /// Execute confirmation token; prompted for when omitted
    #[arg(long)]
    pub execute_token: Option<String>,

    /// Run VACUUM after the cleanup
    #[arg(long)]
    pub vacuum: bool,
}

#[derive(Args)]
pub struct ExportSqlArgs {
    /// Action number as listed by `plan`
    pub number: usize,

    /// Output file (defaults to a timestamped name in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// What to export
    #[arg(value_enum)]
    pub what: ExportKind,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportKind {
    Orphans,
    Affected,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
    Csv,
}
