//! Orphan forensics: what the orphaned references held and where else they
//! are mentioned. Report-only; nothing here feeds the cleanup plan.

use super::classifier::Classification;
use super::inventory::{slot_name, SlotCategory, SlotPartition};
use super::OwnerRef;
use crate::db::{Database, ITEM_TABLE};
use crate::error::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Tables that may still mention a deleted character's id
const TRACE_COLUMNS: [(&str, &str); 6] = [
    ("game_events", "player_id"),
    ("game_events", "target_id"),
    ("buildings", "owner_id"),
    ("buildable_health", "owner_id"),
    ("actor_position", "id"),
    ("properties", "object_id"),
];

const TRACE_SAMPLE: usize = 5;

/// What one orphaned owner reference still holds
#[derive(Debug, Clone, Serialize)]
pub struct OrphanedOwner {
    pub owner_id: OwnerRef,
    pub item_count: u64,
    pub slot_type_count: usize,
    pub template_count: u64,
    pub slot_types: Vec<i64>,
}

/// Orphaned items grouped by slot type
#[derive(Debug, Clone, Serialize)]
pub struct SlotDistribution {
    pub inv_type: i64,
    pub name: String,
    pub category: Option<SlotCategory>,
    pub item_count: u64,
    pub owner_count: usize,
}

/// An item template frequently found among orphaned items
#[derive(Debug, Clone, Serialize)]
pub struct TemplateCount {
    pub template_id: i64,
    pub item_count: u64,
    pub owner_count: u64,
}

/// Rows in another table that reference sampled orphaned ids
#[derive(Debug, Clone, Serialize)]
pub struct TableTrace {
    pub table: String,
    pub column: String,
    pub references: u64,
}

/// Full forensic picture of the orphaned references
#[derive(Debug, Clone, Serialize)]
pub struct Forensics {
    pub orphaned_owners: Vec<OrphanedOwner>,
    pub slot_distribution: Vec<SlotDistribution>,
    pub common_templates: Vec<TemplateCount>,
    pub traces: Vec<TableTrace>,
}

/// Collect forensics for the classified orphaned set
pub fn investigate(
    db: &Database,
    classification: &Classification,
    slots: &SlotPartition,
    limit: usize,
) -> Result<Forensics> {
    let orphaned = classification.orphaned();
    if orphaned.is_empty() {
        return Ok(Forensics {
            orphaned_owners: Vec::new(),
            slot_distribution: Vec::new(),
            common_templates: Vec::new(),
            traces: Vec::new(),
        });
    }

    stage_orphaned_ids(db, orphaned)?;
    let orphaned_owners = orphaned_owners(db)?;
    let common_templates = common_templates(db, limit)?;
    let traces = trace_references(db, orphaned)?;
    db.execute_batch("DROP TABLE IF EXISTS temp.vk_orphaned;")?;

    Ok(Forensics {
        orphaned_owners,
        slot_distribution: slot_distribution(classification, slots),
        common_templates,
        traces,
    })
}

/// Copy the classifier's orphaned set into a temp table so queries can join
/// against it instead of re-deriving ownership in SQL
fn stage_orphaned_ids(db: &Database, orphaned: &BTreeSet<OwnerRef>) -> Result<()> {
    db.execute_batch(
        "DROP TABLE IF EXISTS temp.vk_orphaned;
         CREATE TEMP TABLE vk_orphaned (id INTEGER PRIMARY KEY);",
    )?;
    let tx = db.conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare("INSERT INTO temp.vk_orphaned (id) VALUES (?1)")?;
        for id in orphaned {
            stmt.execute([id])?;
        }
    }
    tx.commit()?;
    debug!(count = orphaned.len(), "staged orphaned ids");
    Ok(())
}

fn orphaned_owners(db: &Database) -> Result<Vec<OrphanedOwner>> {
    let sql = format!(
        "SELECT owner_id, COUNT(*), COUNT(DISTINCT template_id), GROUP_CONCAT(DISTINCT inv_type)
         FROM {}
         WHERE owner_id IN (SELECT id FROM temp.vk_orphaned)
         GROUP BY owner_id
         ORDER BY COUNT(*) DESC, owner_id",
        ITEM_TABLE
    );
    let mut stmt = db.conn.prepare(&sql)?;
    let owners = stmt
        .query_map([], |row| {
            let count: i64 = row.get(1)?;
            let templates: i64 = row.get(2)?;
            let list: Option<String> = row.get(3)?;
            let mut slot_types: Vec<i64> = list
                .unwrap_or_default()
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            slot_types.sort_unstable();
            Ok(OrphanedOwner {
                owner_id: row.get(0)?,
                item_count: count as u64,
                slot_type_count: slot_types.len(),
                template_count: templates as u64,
                slot_types,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(owners)
}

fn common_templates(db: &Database, limit: usize) -> Result<Vec<TemplateCount>> {
    let sql = format!(
        "SELECT template_id, COUNT(*), COUNT(DISTINCT owner_id)
         FROM {}
         WHERE owner_id IN (SELECT id FROM temp.vk_orphaned)
         GROUP BY template_id
         ORDER BY COUNT(*) DESC, template_id
         LIMIT ?1",
        ITEM_TABLE
    );
    let mut stmt = db.conn.prepare(&sql)?;
    let templates = stmt
        .query_map([limit as i64], |row| {
            let template_id: Option<i64> = row.get(0)?;
            let count: i64 = row.get(1)?;
            let owners: i64 = row.get(2)?;
            Ok(TemplateCount {
                template_id: template_id.unwrap_or(-1),
                item_count: count as u64,
                owner_count: owners as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(templates)
}

/// Orphaned item rows per slot type, from the already classified aggregates
pub fn slot_distribution(
    classification: &Classification,
    slots: &SlotPartition,
) -> Vec<SlotDistribution> {
    let mut by_slot: BTreeMap<i64, (u64, usize)> = BTreeMap::new();
    for owner in classification.orphaned() {
        if let Some(items) = classification.items_of(*owner) {
            for (&slot, &count) in &items.by_slot {
                let entry = by_slot.entry(slot).or_default();
                entry.0 += count;
                entry.1 += 1;
            }
        }
    }

    let mut distribution: Vec<SlotDistribution> = by_slot
        .into_iter()
        .map(|(inv_type, (item_count, owner_count))| SlotDistribution {
            inv_type,
            name: slot_name(inv_type),
            category: slots.category(inv_type),
            item_count,
            owner_count,
        })
        .collect();
    distribution.sort_by(|a, b| b.item_count.cmp(&a.item_count).then(a.inv_type.cmp(&b.inv_type)));
    distribution
}

fn trace_references(db: &Database, orphaned: &BTreeSet<OwnerRef>) -> Result<Vec<TableTrace>> {
    let sample: Vec<String> = orphaned
        .iter()
        .take(TRACE_SAMPLE)
        .map(|id| id.to_string())
        .collect();
    let id_list = sample.join(", ");

    let mut traces = Vec::new();
    for (table, column) in TRACE_COLUMNS {
        if !db.table_exists(table)? || !db.columns(table)?.iter().any(|c| c == column) {
            continue;
        }
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} IN ({})",
            table, column, id_list
        );
        let references: i64 = db.conn.query_row(&sql, [], |row| row.get(0))?;
        if references > 0 {
            traces.push(TableTrace {
                table: table.to_string(),
                column: column.to_string(),
                references: references as u64,
            });
        }
    }
    Ok(traces)
}
