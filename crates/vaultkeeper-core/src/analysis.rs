//! Full analysis pass
//!
//! One pass reads a snapshot and runs every stage in order:
//! load, classify, range analysis, damage detection, forensics, plan.

use crate::cleanup::{generate_plan, CleanupPlan};
use crate::config::Config;
use crate::db::{Database, DatabaseStats, GameSchema};
use crate::error::Result;
use crate::ownership::{
    analyze_patterns, classify, detect_damage, investigate, Classification, DamageReport,
    DamageStatus, Forensics, IdPatternReport, SlotPartition,
};
use serde::Serialize;
use tracing::info;

/// Overall state of the item table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthGrade {
    Excellent,
    VeryGood,
    Good,
    NeedsAttention,
}

impl HealthGrade {
    /// Grade from the number of orphaned item rows
    pub fn from_orphaned_rows(rows: u64) -> Self {
        match rows {
            0 => HealthGrade::Excellent,
            1..=999 => HealthGrade::VeryGood,
            1000..=9999 => HealthGrade::Good,
            _ => HealthGrade::NeedsAttention,
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            HealthGrade::Excellent => "No orphaned items",
            HealthGrade::VeryGood => "Minimal orphaned items",
            HealthGrade::Good => "Moderate orphaned items",
            HealthGrade::NeedsAttention => "Many orphaned items, cleanup recommended",
        }
    }
}

impl std::fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthGrade::Excellent => write!(f, "EXCELLENT"),
            HealthGrade::VeryGood => write!(f, "VERY GOOD"),
            HealthGrade::Good => write!(f, "GOOD"),
            HealthGrade::NeedsAttention => write!(f, "NEEDS ATTENTION"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintPriority {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for HintPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HintPriority::High => write!(f, "HIGH"),
            HintPriority::Medium => write!(f, "MEDIUM"),
            HintPriority::Low => write!(f, "LOW"),
        }
    }
}

/// A suggested next step for the operator
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryHint {
    pub priority: HintPriority,
    pub title: String,
    pub detail: String,
}

/// Everything one pass produced
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub schema: GameSchema,
    pub stats: DatabaseStats,
    pub classification: Classification,
    pub patterns: IdPatternReport,
    pub damage: DamageReport,
    pub forensics: Forensics,
    pub health: HealthGrade,
    pub hints: Vec<RecoveryHint>,
    pub plan: CleanupPlan,
}

impl Analysis {
    /// Run a full pass over the database
    pub fn run(db: &Database, config: &Config) -> Result<Self> {
        let slots = SlotPartition::from_config(&config.inventory);

        let sets = db.load_reference_sets()?;
        let classification = classify(&sets)?;
        let patterns = analyze_patterns(
            classification.orphaned().iter().copied(),
            config.analysis.sequential_range_ratio,
        );
        let damage = detect_damage(&sets, &classification, &slots);
        let forensics = investigate(db, &classification, &slots, config.analysis.report_limit)?;
        let plan = generate_plan(&sets.schema, &classification, &damage, &slots);

        let health = HealthGrade::from_orphaned_rows(classification.item_rows.orphaned);
        let hints = recovery_hints(&damage, &patterns, &forensics);

        info!(
            health = %health,
            orphaned = classification.references.orphaned,
            actions = plan.actions.len(),
            "analysis complete"
        );

        Ok(Self {
            schema: sets.schema,
            stats: db.get_stats()?,
            classification,
            patterns,
            damage,
            forensics,
            health,
            hints,
            plan,
        })
    }
}

/// Prioritised next steps, highest first
pub fn recovery_hints(
    damage: &DamageReport,
    patterns: &IdPatternReport,
    forensics: &Forensics,
) -> Vec<RecoveryHint> {
    let mut hints = Vec::new();

    if damage.cleanup_blocked {
        let count = |status: DamageStatus| {
            damage
                .affected
                .iter()
                .filter(|p| p.status == Some(status))
                .count()
        };
        hints.push(RecoveryHint {
            priority: HintPriority::High,
            title: "Restore or compensate affected players".to_string(),
            detail: format!(
                "{} active characters lost all of their items and {} are missing external \
                 storage items. Restore from a backup taken before the earlier cleanup, or \
                 compensate them manually.",
                count(DamageStatus::AllItemsLost),
                count(DamageStatus::MissingExternalStorage)
            ),
        });
    }

    hints.push(RecoveryHint {
        priority: HintPriority::High,
        title: "Compare with backup databases".to_string(),
        detail: "Look up the orphaned ids in older backups to see which characters they were."
            .to_string(),
    });

    if !forensics.traces.is_empty() {
        let tables: Vec<String> = forensics
            .traces
            .iter()
            .map(|t| format!("{}.{}", t.table, t.column))
            .collect();
        hints.push(RecoveryHint {
            priority: HintPriority::Medium,
            title: "Inspect remaining references".to_string(),
            detail: format!(
                "Orphaned ids still appear in {}. game_events may show when and why the \
                 characters disappeared.",
                tables.join(", ")
            ),
        });
    }

    if patterns.appears_sequential {
        hints.push(RecoveryHint {
            priority: HintPriority::Low,
            title: "Possible mass deletion (heuristic)".to_string(),
            detail: format!(
                "{} orphaned ids fall into {} ranges. A bulk wipe, migration or script is more \
                 likely than players leaving; check server logs around that time.",
                patterns.orphaned_count, patterns.range_count
            ),
        });
    }

    hints.sort_by_key(|h| h.priority);
    hints
}
