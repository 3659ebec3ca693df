//! Cleanup plan generation
//!
//! Turns one classification and damage report into an ordered list of
//! risk-tagged actions. Row estimates come from the classification itself;
//! no extra queries are made.

use crate::db::{GameSchema, ITEM_TABLE, GUILD_TABLE, STRUCTURE_TABLE};
use crate::error::{Result, VaultkeeperError};
use crate::ownership::{
    Classification, ClassKind, DamageReport, OwnerRef, SlotPartition, UNOWNED,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Severity of harm if an action is misapplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Safe,
    Conservative,
    Dangerous,
    Blocked,
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Safe => write!(f, "SAFE"),
            RiskTier::Conservative => write!(f, "CONSERVATIVE"),
            RiskTier::Dangerous => write!(f, "DANGEROUS"),
            RiskTier::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// What an action is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    NoActionNeeded,
    DeleteOrphaned,
    DeleteOrphanedPersonal,
    /// The historical `owner NOT IN characters` cleanup, kept as a warning
    NaiveCharacterFilter,
    DamageControl,
}

/// Which item rows an action targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionFilter {
    Nothing,
    /// Rows owned by exactly these references, optionally only in these
    /// slot types
    OwnersIn {
        owners: BTreeSet<OwnerRef>,
        slot_types: Option<BTreeSet<i64>>,
    },
    /// Rows whose owner is not an active character
    NotCharacterOwned,
}

impl ActionFilter {
    /// Whether an item row with this owner and slot would be affected
    pub fn matches(&self, classification: &Classification, owner: OwnerRef, slot: i64) -> bool {
        match self {
            ActionFilter::Nothing => false,
            ActionFilter::OwnersIn { owners, slot_types } => {
                owners.contains(&owner)
                    && slot_types.as_ref().map_or(true, |slots| slots.contains(&slot))
            }
            ActionFilter::NotCharacterOwned => {
                owner != UNOWNED
                    && classification.class_of(owner).map(|c| c.kind())
                        != Some(ClassKind::ActiveCharacter)
            }
        }
    }
}

/// One maintenance action offered to the operator
#[derive(Debug, Clone, Serialize)]
pub struct CleanupAction {
    pub title: String,
    pub description: String,
    pub risk_tier: RiskTier,
    pub kind: ActionKind,
    /// Human readable filter description
    pub predicate: String,
    pub estimated_row_count: u64,
    pub impact: String,
    pub statement: Option<String>,
    /// Reason this action must not be run, when there is one
    pub guard: Option<String>,
    #[serde(skip)]
    pub filter: ActionFilter,
}

impl CleanupAction {
    /// Only Safe and Conservative actions with a statement and no guard may
    /// ever be executed
    pub fn is_executable(&self) -> bool {
        matches!(self.risk_tier, RiskTier::Safe | RiskTier::Conservative)
            && self.statement.is_some()
            && self.guard.is_none()
    }

    /// Owner references the action deletes from, if it targets explicit ids
    pub fn target_owners(&self) -> Option<&BTreeSet<OwnerRef>> {
        match &self.filter {
            ActionFilter::OwnersIn { owners, .. } => Some(owners),
            _ => None,
        }
    }
}

/// Ordered action list from one analysis pass
#[derive(Debug, Clone, Serialize)]
pub struct CleanupPlan {
    pub actions: Vec<CleanupAction>,
    pub cleanup_blocked: bool,
    pub generated_at: DateTime<Utc>,
}

impl CleanupPlan {
    /// A plan is blocked when damage was detected or any action is Blocked;
    /// nothing in a blocked plan may run
    pub fn is_blocked(&self) -> bool {
        self.cleanup_blocked
            || self
                .actions
                .iter()
                .any(|a| a.risk_tier == RiskTier::Blocked)
    }

    /// Action by zero-based index
    pub fn action(&self, index: usize) -> Result<&CleanupAction> {
        self.actions
            .get(index)
            .ok_or(VaultkeeperError::ActionNotFound(index))
    }

    /// Action by zero-based index, refusing anything that must not run
    pub fn executable_action(&self, index: usize) -> Result<&CleanupAction> {
        let action = self.action(index)?;
        if self.is_blocked() {
            return Err(VaultkeeperError::ActionNotExecutable {
                index,
                reason: "the plan is blocked by detected cleanup damage".to_string(),
            });
        }
        if !action.is_executable() {
            let reason = match action.risk_tier {
                RiskTier::Dangerous => "dangerous actions are shown for education only".to_string(),
                RiskTier::Blocked => "blocked actions cannot run".to_string(),
                _ => action
                    .guard
                    .clone()
                    .unwrap_or_else(|| "the action has no statement to run".to_string()),
            };
            return Err(VaultkeeperError::ActionNotExecutable { index, reason });
        }
        Ok(action)
    }
}

/// Build the action list for one analysis pass
pub fn generate_plan(
    schema: &GameSchema,
    classification: &Classification,
    damage: &DamageReport,
    slots: &SlotPartition,
) -> CleanupPlan {
    let actions = if damage.cleanup_blocked {
        vec![damage_control(damage)]
    } else if classification.orphaned().is_empty() {
        vec![no_action_needed(classification)]
    } else {
        vec![
            delete_orphaned(schema, classification),
            delete_orphaned_personal(schema, classification, slots),
            naive_character_filter(schema, classification),
        ]
    };

    debug!(
        actions = actions.len(),
        blocked = damage.cleanup_blocked,
        "generated cleanup plan"
    );

    CleanupPlan {
        actions,
        cleanup_blocked: damage.cleanup_blocked,
        generated_at: Utc::now(),
    }
}

fn damage_control(damage: &DamageReport) -> CleanupAction {
    let affected = damage.affected.len();
    CleanupAction {
        title: "DAMAGE CONTROL - do not run any cleanup".to_string(),
        description: format!(
            "{} of {} active characters have personal items but no external storage, or no items at all. \
             An earlier cleanup most likely deleted items held in their chests and crafting stations.",
            affected, damage.scanned
        ),
        risk_tier: RiskTier::Blocked,
        kind: ActionKind::DamageControl,
        predicate: "none".to_string(),
        estimated_row_count: 0,
        impact: "Recovery needed: restore from backup or compensate the affected players".to_string(),
        statement: None,
        guard: Some(
            "Cleanup stays blocked until the damage is addressed. The check also flags players who \
             never owned a chest; review the list manually."
                .to_string(),
        ),
        filter: ActionFilter::Nothing,
    }
}

fn no_action_needed(classification: &Classification) -> CleanupAction {
    CleanupAction {
        title: "No cleanup needed".to_string(),
        description: format!(
            "No orphaned owner references. All items belong to active characters ({} rows), \
             structures ({} rows) or guilds ({} rows).",
            classification.item_rows.active_character,
            classification.item_rows.structure,
            classification.item_rows.guild
        ),
        risk_tier: RiskTier::Safe,
        kind: ActionKind::NoActionNeeded,
        predicate: "none".to_string(),
        estimated_row_count: 0,
        impact: "No action needed, the database is healthy".to_string(),
        statement: None,
        guard: None,
        filter: ActionFilter::Nothing,
    }
}

fn delete_orphaned(schema: &GameSchema, classification: &Classification) -> CleanupAction {
    let owners = classification.orphaned().clone();
    let estimated = classification.item_rows_for(&owners, None);

    CleanupAction {
        title: "RECOMMENDED: truly orphaned items only".to_string(),
        description: format!(
            "Delete items whose owner is {}. Items in chests, crafting stations and guild storage are preserved.",
            orphan_clause(schema)
        ),
        risk_tier: RiskTier::Safe,
        kind: ActionKind::DeleteOrphaned,
        predicate: format!("{} ({} references)", orphan_clause(schema), owners.len()),
        estimated_row_count: estimated,
        impact: format!(
            "Removes {} orphaned item rows; keeps {} rows in structures",
            estimated, classification.item_rows.structure
        ),
        statement: Some(delete_statement(&owners, None)),
        guard: None,
        filter: ActionFilter::OwnersIn {
            owners,
            slot_types: None,
        },
    }
}

fn delete_orphaned_personal(
    schema: &GameSchema,
    classification: &Classification,
    slots: &SlotPartition,
) -> CleanupAction {
    let owners = classification.orphaned().clone();
    let personal = slots.personal().clone();
    let estimated = classification.item_rows_for(&owners, Some(&personal));

    CleanupAction {
        title: "CONSERVATIVE: personal items of deleted characters only".to_string(),
        description: format!(
            "Delete only inventory, hotbar, equipment and loot bag items whose owner is {}.",
            orphan_clause(schema)
        ),
        risk_tier: RiskTier::Conservative,
        kind: ActionKind::DeleteOrphanedPersonal,
        predicate: format!(
            "{} AND inv_type IN ({}) ({} references)",
            orphan_clause(schema),
            join_ids(&personal),
            owners.len()
        ),
        estimated_row_count: estimated,
        impact: format!(
            "Removes {} personal item rows; preserves everything held in storage slots",
            estimated
        ),
        statement: Some(delete_statement(&owners, Some(&personal))),
        guard: None,
        filter: ActionFilter::OwnersIn {
            owners,
            slot_types: Some(personal),
        },
    }
}

fn naive_character_filter(schema: &GameSchema, classification: &Classification) -> CleanupAction {
    let structures = classification.references.structure;
    let structure_rows = classification.item_rows.structure;
    let guild_rows = classification.item_rows.guild;

    CleanupAction {
        title: "DANGEROUS: \"not owned by a character\" (destroys chests)".to_string(),
        description: "The single negative check against the character table. Items in chests are \
                      owned by the chest's id, which is never a character id, so this treats every \
                      chest and crafting station as a deleted character."
            .to_string(),
        risk_tier: RiskTier::Dangerous,
        kind: ActionKind::NaiveCharacterFilter,
        predicate: format!("owner_id NOT IN {}", schema.character_table),
        estimated_row_count: structures,
        impact: format!(
            "Would wrongly destroy the contents of {} structures ({} item rows{})",
            structures,
            structure_rows,
            if guild_rows > 0 {
                format!(", plus {} guild-owned rows", guild_rows)
            } else {
                String::new()
            }
        ),
        statement: Some(format!(
            "DELETE FROM {} WHERE owner_id NOT IN (SELECT id FROM {})",
            ITEM_TABLE, schema.character_table
        )),
        guard: Some("Documentation only. Never run this statement.".to_string()),
        filter: ActionFilter::NotCharacterOwned,
    }
}

/// "not in characters, not in actor_position, not in guilds" for the tables
/// this database has
fn orphan_clause(schema: &GameSchema) -> String {
    let mut spaces = vec![schema.character_table.as_str()];
    if schema.has_structures {
        spaces.push(STRUCTURE_TABLE);
    }
    if schema.has_guilds {
        spaces.push(GUILD_TABLE);
    }
    spaces
        .iter()
        .map(|t| format!("not in {}", t))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_ids<'a>(ids: impl IntoIterator<Item = &'a i64>) -> String {
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// DELETE over the explicit classified id set, so the statement cannot
/// disagree with the classification it was planned from
fn delete_statement(owners: &BTreeSet<OwnerRef>, slots: Option<&BTreeSet<i64>>) -> String {
    let mut sql = format!(
        "DELETE FROM {} WHERE owner_id IN ({})",
        ITEM_TABLE,
        join_ids(owners)
    );
    if let Some(slots) = slots {
        sql.push_str(&format!(" AND inv_type IN ({})", join_ids(slots)));
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::ownership::{classify, detect_damage, AffectedPlayer, DamageStatus};

    fn fixture_plan() -> (Classification, CleanupPlan) {
        let db = fixtures::game_db();
        let sets = db.load_reference_sets().unwrap();
        let classification = classify(&sets).unwrap();
        let slots = SlotPartition::default();
        let damage = detect_damage(&sets, &classification, &slots);
        let plan = generate_plan(&sets.schema, &classification, &damage, &slots);
        (classification, plan)
    }

    fn flagged_damage() -> DamageReport {
        DamageReport {
            scanned: 2,
            affected: vec![AffectedPlayer {
                character_id: 2,
                display_name: "Valeria".to_string(),
                level: Some(42),
                remaining_item_total: 0,
                has_personal_items: false,
                has_external_storage: false,
                suspected_damage: true,
                status: Some(DamageStatus::AllItemsLost),
                slot_types: BTreeSet::new(),
            }],
            cleanup_blocked: true,
        }
    }

    #[test]
    fn test_three_actions_in_order() {
        let (classification, plan) = fixture_plan();
        let tiers: Vec<RiskTier> = plan.actions.iter().map(|a| a.risk_tier).collect();
        assert_eq!(
            tiers,
            vec![RiskTier::Safe, RiskTier::Conservative, RiskTier::Dangerous]
        );
        assert!(!plan.is_blocked());

        assert_eq!(plan.actions[0].estimated_row_count, 5);
        assert_eq!(plan.actions[1].estimated_row_count, 4);
        assert_eq!(
            plan.actions[2].estimated_row_count,
            classification.references.structure
        );
        assert_ne!(
            plan.actions[2].estimated_row_count,
            classification.references.orphaned
        );
    }

    #[test]
    fn test_safe_statement_targets_classified_orphans() {
        let (classification, plan) = fixture_plan();
        let safe = &plan.actions[0];
        assert_eq!(
            safe.statement.as_deref(),
            Some("DELETE FROM item_inventory WHERE owner_id IN (777, 900, 901, 902, 950)")
        );
        assert!(safe.predicate.contains("not in characters, not in actor_position, not in guilds"));

        assert!(safe.filter.matches(&classification, 900, 4));
        assert!(!safe.filter.matches(&classification, 100, 4));
        assert!(!safe.filter.matches(&classification, 1, 0));
        assert!(!safe.filter.matches(&classification, 0, 0));
    }

    #[test]
    fn test_conservative_restricts_to_personal_slots() {
        let (classification, plan) = fixture_plan();
        let conservative = &plan.actions[1];
        assert!(conservative
            .statement
            .as_deref()
            .unwrap()
            .ends_with("AND inv_type IN (0, 1, 2, 3)"));
        assert!(conservative.filter.matches(&classification, 900, 1));
        assert!(!conservative.filter.matches(&classification, 902, 5));
    }

    #[test]
    fn test_dangerous_is_never_executable() {
        let (classification, plan) = fixture_plan();
        let dangerous = &plan.actions[2];
        assert!(!dangerous.is_executable());
        assert!(dangerous.guard.is_some());
        // The naive filter hits chest contents
        assert!(dangerous.filter.matches(&classification, 100, 4));
        assert!(!dangerous.filter.matches(&classification, 1, 0));

        match plan.executable_action(2) {
            Err(VaultkeeperError::ActionNotExecutable { reason, .. }) => {
                assert!(reason.contains("education"))
            }
            other => panic!("expected refusal, got {:?}", other.map(|a| a.title.clone())),
        }
        assert!(plan.executable_action(0).is_ok());
        assert!(plan.executable_action(1).is_ok());
        assert!(matches!(
            plan.executable_action(3),
            Err(VaultkeeperError::ActionNotFound(3))
        ));
    }

    #[test]
    fn test_damage_blocks_everything() {
        let db = fixtures::game_db();
        let sets = db.load_reference_sets().unwrap();
        let classification = classify(&sets).unwrap();
        let plan = generate_plan(
            &sets.schema,
            &classification,
            &flagged_damage(),
            &SlotPartition::default(),
        );

        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].risk_tier, RiskTier::Blocked);
        assert!(plan.is_blocked());
        assert!(plan.executable_action(0).is_err());
    }

    #[test]
    fn test_blocked_action_suppresses_execution_of_safe_ones() {
        let (_, mut plan) = fixture_plan();
        plan.actions.push(damage_control(&flagged_damage()));
        assert!(plan.is_blocked());
        assert!(matches!(
            plan.executable_action(0),
            Err(VaultkeeperError::ActionNotExecutable { .. })
        ));
    }

    #[test]
    fn test_no_orphans_single_safe_entry() {
        let db = fixtures::game_db();
        db.execute_batch(
            "DELETE FROM item_inventory WHERE owner_id IN (900, 901, 902, 950);
             DELETE FROM buildings WHERE owner_id = 777;",
        )
        .unwrap();
        let sets = db.load_reference_sets().unwrap();
        let classification = classify(&sets).unwrap();
        let slots = SlotPartition::default();
        let damage = detect_damage(&sets, &classification, &slots);
        let plan = generate_plan(&sets.schema, &classification, &damage, &slots);

        assert_eq!(plan.actions.len(), 1);
        let only = &plan.actions[0];
        assert_eq!(only.risk_tier, RiskTier::Safe);
        assert_eq!(only.kind, ActionKind::NoActionNeeded);
        assert!(only.statement.is_none());
        assert!(!only.is_executable());
    }

    #[test]
    fn test_predicate_omits_missing_tables() {
        let schema = GameSchema {
            character_table: "characters".to_string(),
            has_name_column: false,
            has_level_column: false,
            has_alive_column: false,
            has_structures: false,
            has_guilds: false,
            has_guild_name_column: false,
            has_guild_owner_column: false,
            has_buildings: false,
            has_building_pieces: false,
        };
        assert_eq!(orphan_clause(&schema), "not in characters");
    }
}
