//! Action execution
//!
//! Running an action is a fixed sequence of discrete steps:
//! `select -> confirm_backup -> confirm_execute -> run`. Each step is a
//! method call so a non-interactive caller can drive it. Any wrong token or
//! out-of-order call is rejected and nothing touches the database until
//! `run`.

use super::plan::{CleanupAction, CleanupPlan};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Result, VaultkeeperError};
use crate::ownership::{classify, detect_damage, SlotPartition};
use serde::Serialize;
use tracing::{info, warn};

/// Token the operator types to confirm a backup exists
pub const BACKUP_TOKEN: &str = "BACKUP DONE";

/// Token the operator types to run the statement
pub const EXECUTE_TOKEN: &str = "EXECUTE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Planned,
    Selected(usize),
    BackupConfirmed(usize),
    ExecuteConfirmed(usize),
    Finished,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Planned => "planned",
            Stage::Selected(_) => "selected",
            Stage::BackupConfirmed(_) => "backup confirmed",
            Stage::ExecuteConfirmed(_) => "execute confirmed",
            Stage::Finished => "finished",
        }
    }
}

/// What happened when an action ran
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub action: String,
    pub estimated: u64,
    pub affected: u64,
    /// Set when the real count diverges from the estimate beyond tolerance
    pub anomaly: bool,
    pub divergence: f64,
    pub vacuumed: bool,
    pub vacuum_warning: Option<String>,
}

/// Relative divergence of the real count from the estimate
pub fn divergence(estimated: u64, affected: u64) -> f64 {
    let diff = (estimated as f64 - affected as f64).abs();
    diff / (estimated.max(1) as f64)
}

/// One pass through the confirmation sequence for a single plan
#[derive(Debug)]
pub struct CleanupSession {
    plan: CleanupPlan,
    stage: Stage,
}

impl CleanupSession {
    pub fn new(plan: CleanupPlan) -> Self {
        Self {
            plan,
            stage: Stage::Planned,
        }
    }

    pub fn plan(&self) -> &CleanupPlan {
        &self.plan
    }

    /// The selected action, if any
    pub fn selected(&self) -> Option<&CleanupAction> {
        match self.stage {
            Stage::Selected(i) | Stage::BackupConfirmed(i) | Stage::ExecuteConfirmed(i) => {
                self.plan.actions.get(i)
            }
            _ => None,
        }
    }

    /// Pick the action to run by zero-based index. Dangerous, Blocked and
    /// informational actions are refused here and again in `run`.
    pub fn select(&mut self, index: usize) -> Result<&CleanupAction> {
        self.expect_stage(Stage::Planned, "select")?;
        self.plan.executable_action(index)?;
        self.stage = Stage::Selected(index);
        self.plan.action(index)
    }

    pub fn confirm_backup(&mut self, token: &str) -> Result<()> {
        let Stage::Selected(index) = self.stage else {
            return Err(self.out_of_order("confirm_backup"));
        };
        if token.trim() != BACKUP_TOKEN {
            self.stage = Stage::Planned;
            return Err(VaultkeeperError::ConfirmationRejected(format!(
                "expected '{}' to confirm a backup",
                BACKUP_TOKEN
            )));
        }
        self.stage = Stage::BackupConfirmed(index);
        Ok(())
    }

    pub fn confirm_execute(&mut self, token: &str) -> Result<()> {
        let Stage::BackupConfirmed(index) = self.stage else {
            return Err(self.out_of_order("confirm_execute"));
        };
        if token.trim() != EXECUTE_TOKEN {
            self.stage = Stage::Planned;
            return Err(VaultkeeperError::ConfirmationRejected(format!(
                "expected '{}' to run the statement",
                EXECUTE_TOKEN
            )));
        }
        self.stage = Stage::ExecuteConfirmed(index);
        Ok(())
    }

    /// Re-validate against a fresh analysis pass, then run the statement
    /// inside a transaction. Never retried; a failed run ends the session.
    pub fn run(&mut self, db: &Database, config: &Config) -> Result<ExecutionOutcome> {
        let Stage::ExecuteConfirmed(index) = self.stage else {
            return Err(self.out_of_order("run"));
        };
        self.stage = Stage::Finished;

        let action = self.plan.executable_action(index)?;
        let statement = action
            .statement
            .as_deref()
            .ok_or_else(|| VaultkeeperError::ActionNotExecutable {
                index,
                reason: "the action has no statement to run".to_string(),
            })?;

        let slots = SlotPartition::from_config(&config.inventory);
        let sets = db.load_reference_sets()?;
        let classification = classify(&sets)?;
        let damage = detect_damage(&sets, &classification, &slots);
        if damage.cleanup_blocked {
            return Err(VaultkeeperError::CleanupBlocked(damage.affected.len()));
        }

        if let Some(owners) = action.target_owners() {
            if let Some(owner) = owners
                .iter()
                .find(|owner| !classification.orphaned().contains(owner))
            {
                let now = classification
                    .class_of(*owner)
                    .map(|c| c.kind().label())
                    .unwrap_or("absent");
                return Err(VaultkeeperError::StalePlan(format!(
                    "owner reference {} is no longer orphaned (now {}); re-run the analysis",
                    owner, now
                )));
            }
        }

        info!(action = %action.title, estimated = action.estimated_row_count, "executing cleanup action");
        let affected = db
            .execute_in_transaction(statement)
            .map_err(|e| match e {
                VaultkeeperError::Database(inner) => VaultkeeperError::Execution {
                    action: action.title.clone(),
                    message: format!(
                        "{} (the transaction was rolled back; the database should be unchanged)",
                        inner
                    ),
                },
                other => other,
            })? as u64;

        let estimated = action.estimated_row_count;
        let divergence = divergence(estimated, affected);
        let anomaly = divergence > config.execution.anomaly_tolerance;
        if anomaly {
            warn!(
                estimated,
                affected, divergence, "affected rows diverge from the plan estimate"
            );
        } else {
            info!(affected, "cleanup action completed");
        }

        let mut outcome = ExecutionOutcome {
            action: action.title.clone(),
            estimated,
            affected,
            anomaly,
            divergence,
            vacuumed: false,
            vacuum_warning: None,
        };

        if config.execution.vacuum_after {
            match db.vacuum() {
                Ok(()) => outcome.vacuumed = true,
                Err(e) => {
                    warn!(error = %e, "VACUUM failed after cleanup");
                    outcome.vacuum_warning = Some(e.to_string());
                }
            }
        }

        Ok(outcome)
    }

    fn expect_stage(&self, expected: Stage, step: &str) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(self.out_of_order(step))
        }
    }

    fn out_of_order(&self, step: &str) -> VaultkeeperError {
        VaultkeeperError::InvalidInput(format!(
            "cannot {} while the session is {}",
            step,
            self.stage.name()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::generate_plan;
    use crate::db::fixtures;

    fn session_for(db: &Database) -> CleanupSession {
        let sets = db.load_reference_sets().unwrap();
        let classification = classify(&sets).unwrap();
        let slots = SlotPartition::default();
        let damage = detect_damage(&sets, &classification, &slots);
        CleanupSession::new(generate_plan(&sets.schema, &classification, &damage, &slots))
    }

    fn confirmed(db: &Database, index: usize) -> CleanupSession {
        let mut session = session_for(db);
        session.select(index).unwrap();
        session.confirm_backup(BACKUP_TOKEN).unwrap();
        session.confirm_execute(EXECUTE_TOKEN).unwrap();
        session
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn test_safe_action_round_trip() {
        let db = fixtures::game_db();
        let mut session = confirmed(&db, 0);
        let outcome = session.run(&db, &Config::default()).unwrap();

        assert_eq!(outcome.estimated, 5);
        assert_eq!(outcome.affected, 5);
        assert!(!outcome.anomaly);
        assert!(!outcome.vacuumed);

        // Chest and character items are untouched
        assert_eq!(count(&db, "SELECT COUNT(*) FROM item_inventory WHERE owner_id = 100"), 3);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM item_inventory WHERE owner_id IN (1, 2)"), 5);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM item_inventory WHERE owner_id >= 900"), 0);
    }

    #[test]
    fn test_conservative_keeps_orphaned_storage() {
        let db = fixtures::game_db();
        let mut config = Config::default();
        config.execution.vacuum_after = true;
        let outcome = confirmed(&db, 1).run(&db, &config).unwrap();

        assert_eq!(outcome.affected, 4);
        assert!(outcome.vacuumed);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM item_inventory WHERE owner_id = 902"), 1);
    }

    #[test]
    fn test_wrong_tokens_reject() {
        let db = fixtures::game_db();
        let mut session = session_for(&db);
        session.select(0).unwrap();
        assert!(matches!(
            session.confirm_backup("yes"),
            Err(VaultkeeperError::ConfirmationRejected(_))
        ));
        // Rejection returns to the start of the sequence
        assert!(session.confirm_execute(EXECUTE_TOKEN).is_err());

        session.select(0).unwrap();
        session.confirm_backup(BACKUP_TOKEN).unwrap();
        assert!(session.confirm_execute("execute").is_err());
        assert!(session.run(&db, &Config::default()).is_err());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM item_inventory"), 16);
    }

    #[test]
    fn test_out_of_order_calls() {
        let db = fixtures::game_db();
        let mut session = session_for(&db);
        assert!(matches!(
            session.run(&db, &Config::default()),
            Err(VaultkeeperError::InvalidInput(_))
        ));
        assert!(session.confirm_backup(BACKUP_TOKEN).is_err());

        let mut done = confirmed(&db, 0);
        done.run(&db, &Config::default()).unwrap();
        assert!(done.run(&db, &Config::default()).is_err());
        assert!(done.select(0).is_err());
    }

    #[test]
    fn test_dangerous_cannot_be_selected() {
        let db = fixtures::game_db();
        let mut session = session_for(&db);
        assert!(matches!(
            session.select(2),
            Err(VaultkeeperError::ActionNotExecutable { index: 2, .. })
        ));
        assert!(session.selected().is_none());
    }

    #[test]
    fn test_damage_after_planning_blocks_run() {
        let db = fixtures::game_db();
        let mut session = confirmed(&db, 0);
        db.execute_batch("DELETE FROM item_inventory WHERE owner_id = 2;")
            .unwrap();

        assert!(matches!(
            session.run(&db, &Config::default()),
            Err(VaultkeeperError::CleanupBlocked(1))
        ));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM item_inventory WHERE owner_id = 900"), 2);
    }

    #[test]
    fn test_reclassified_owner_makes_plan_stale() {
        let db = fixtures::game_db();
        let mut session = confirmed(&db, 0);
        db.execute_batch("INSERT INTO actor_position (class, map, id, x, y, z) VALUES ('BP_Chest', 'ConanSandbox', 902, 0, 0, 0);")
            .unwrap();

        match session.run(&db, &Config::default()) {
            Err(VaultkeeperError::StalePlan(message)) => assert!(message.contains("902")),
            other => panic!("expected stale plan, got {:?}", other),
        }
    }

    #[test]
    fn test_anomaly_reported() {
        let db = fixtures::game_db();
        let mut session = confirmed(&db, 0);
        // More rows appear for an already orphaned owner after planning
        db.execute_batch(
            "INSERT INTO item_inventory (item_id, owner_id, inv_type, template_id) VALUES
                (3, 900, 0, 10), (4, 900, 0, 10), (5, 900, 0, 10);",
        )
        .unwrap();

        let outcome = session.run(&db, &Config::default()).unwrap();
        assert_eq!(outcome.estimated, 5);
        assert_eq!(outcome.affected, 8);
        assert!(outcome.anomaly);
    }

    #[test]
    fn test_database_rejection_is_execution_error() {
        let db = fixtures::game_db();
        let mut session = confirmed(&db, 0);
        db.execute_batch(
            "CREATE TRIGGER refuse BEFORE DELETE ON item_inventory
             BEGIN SELECT RAISE(ABORT, 'deletes are frozen'); END;",
        )
        .unwrap();

        match session.run(&db, &Config::default()) {
            Err(VaultkeeperError::Execution { message, .. }) => {
                assert!(message.contains("deletes are frozen"))
            }
            other => panic!("expected execution error, got {:?}", other),
        }
        assert_eq!(count(&db, "SELECT COUNT(*) FROM item_inventory"), 16);
    }

    #[test]
    fn test_divergence() {
        assert_eq!(divergence(100, 100), 0.0);
        assert!((divergence(100, 90) - 0.1).abs() < 1e-9);
        assert_eq!(divergence(0, 3), 3.0);
    }
}
