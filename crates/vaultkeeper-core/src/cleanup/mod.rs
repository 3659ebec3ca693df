//! Cleanup planning and execution

mod executor;
mod plan;
mod script;

pub use executor::{
    divergence, CleanupSession, ExecutionOutcome, BACKUP_TOKEN, EXECUTE_TOKEN,
};
pub use plan::{generate_plan, ActionFilter, ActionKind, CleanupAction, CleanupPlan, RiskTier};
pub use script::{render_script, script_file_name, write_script};
