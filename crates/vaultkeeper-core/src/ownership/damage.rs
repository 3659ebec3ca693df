//! Cleanup damage detection
//!
//! A cleanup that treated structure-owned items as orphaned leaves live
//! characters with their personal inventory intact and nothing in external
//! storage. This module looks for that shape.
//!
//! The check is conservative: a character who never owned a chest looks the
//! same as one whose chests were wiped and gets flagged. A false positive
//! costs a manual review; a missed wipe costs player data.

use super::classifier::Classification;
use super::inventory::{SlotCategory, SlotPartition};
use crate::db::{CharacterRecord, ReferenceSets};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Why a character was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageStatus {
    MissingExternalStorage,
    AllItemsLost,
}

impl std::fmt::Display for DamageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DamageStatus::MissingExternalStorage => write!(f, "Missing External Storage"),
            DamageStatus::AllItemsLost => write!(f, "All Items Lost"),
        }
    }
}

/// An active character's remaining inventory composition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedPlayer {
    pub character_id: i64,
    pub display_name: String,
    pub level: Option<i64>,
    pub remaining_item_total: u64,
    pub has_personal_items: bool,
    pub has_external_storage: bool,
    pub suspected_damage: bool,
    pub status: Option<DamageStatus>,
    /// Slot codes the character still has items in
    pub slot_types: BTreeSet<i64>,
}

/// Result of scanning every active character
#[derive(Debug, Clone, Default, Serialize)]
pub struct DamageReport {
    /// Active characters scanned
    pub scanned: usize,
    /// Characters flagged as suspected damage
    pub affected: Vec<AffectedPlayer>,
    /// Set whenever `affected` is non-empty
    pub cleanup_blocked: bool,
}

/// Assess one character from its classified item aggregates
pub fn assess_character(
    character: &CharacterRecord,
    classification: &Classification,
    slots: &SlotPartition,
) -> AffectedPlayer {
    let items = classification.items_of(character.id);
    let slot_types: BTreeSet<i64> = items
        .map(|items| items.by_slot.keys().copied().collect())
        .unwrap_or_default();
    let remaining_item_total = items.map(|items| items.total).unwrap_or(0);

    let has_personal_items = slot_types
        .iter()
        .any(|&code| slots.category(code) == Some(SlotCategory::Personal));
    let has_external_storage = slot_types
        .iter()
        .any(|&code| slots.category(code) == Some(SlotCategory::ExternalStorage));

    let status = if remaining_item_total == 0 {
        Some(DamageStatus::AllItemsLost)
    } else if has_personal_items && !has_external_storage {
        Some(DamageStatus::MissingExternalStorage)
    } else {
        None
    };

    AffectedPlayer {
        character_id: character.id,
        display_name: character.display_name(),
        level: character.level,
        remaining_item_total,
        has_personal_items,
        has_external_storage,
        suspected_damage: status.is_some(),
        status,
        slot_types,
    }
}

/// Scan every active character for signs of an over-broad earlier cleanup
pub fn detect_damage(
    sets: &ReferenceSets,
    classification: &Classification,
    slots: &SlotPartition,
) -> DamageReport {
    let mut scanned = 0;
    let mut affected = Vec::new();

    for character in sets.characters.values().filter(|c| c.is_alive) {
        scanned += 1;
        let assessment = assess_character(character, classification, slots);
        if assessment.suspected_damage {
            affected.push(assessment);
        }
    }

    let cleanup_blocked = !affected.is_empty();
    if cleanup_blocked {
        warn!(
            affected = affected.len(),
            scanned, "active characters show signs of cleanup damage; cleanup blocked"
        );
    } else {
        info!(scanned, "no cleanup damage detected");
    }

    DamageReport {
        scanned,
        affected,
        cleanup_blocked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, Database};
    use crate::ownership::classify;

    #[test]
    fn test_fixture_has_no_damage() {
        let db = fixtures::game_db();
        let sets = db.load_reference_sets().unwrap();
        let classification = classify(&sets).unwrap();

        let report = detect_damage(&sets, &classification, &SlotPartition::default());
        // Subotai is dead and not scanned
        assert_eq!(report.scanned, 2);
        assert!(report.affected.is_empty());
        assert!(!report.cleanup_blocked);
    }

    #[test]
    fn test_wiped_external_storage_is_flagged() {
        let db = fixtures::game_db();
        // The historical NOT IN (characters) cleanup: chests and every
        // character's external slots are gone
        db.execute_batch(
            "DELETE FROM item_inventory WHERE owner_id NOT IN (SELECT id FROM characters);
             DELETE FROM item_inventory WHERE inv_type >= 4;",
        )
        .unwrap();
        let sets = db.load_reference_sets().unwrap();
        let classification = classify(&sets).unwrap();

        let report = detect_damage(&sets, &classification, &SlotPartition::default());
        assert!(report.cleanup_blocked);
        assert_eq!(report.affected.len(), 2);

        let conan = &report.affected[0];
        assert_eq!(conan.display_name, "Conan");
        assert_eq!(conan.remaining_item_total, 2);
        assert!(conan.has_personal_items);
        assert!(!conan.has_external_storage);
        assert_eq!(conan.status, Some(DamageStatus::MissingExternalStorage));
    }

    #[test]
    fn test_empty_inventory_is_flagged() {
        let db = fixtures::game_db();
        db.execute_batch("DELETE FROM item_inventory WHERE owner_id = 2;")
            .unwrap();
        let sets = db.load_reference_sets().unwrap();
        let classification = classify(&sets).unwrap();

        let report = detect_damage(&sets, &classification, &SlotPartition::default());
        assert_eq!(report.affected.len(), 1);
        let valeria = &report.affected[0];
        assert_eq!(valeria.character_id, 2);
        assert_eq!(valeria.remaining_item_total, 0);
        assert!(!valeria.has_personal_items);
        assert_eq!(valeria.status, Some(DamageStatus::AllItemsLost));
    }

    #[test]
    fn test_external_only_is_not_flagged() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE characters (id INTEGER PRIMARY KEY, char_name TEXT, isAlive INTEGER);
             CREATE TABLE item_inventory (item_id INTEGER, owner_id INTEGER, inv_type INTEGER, template_id INTEGER);
             INSERT INTO characters VALUES (1, 'Crafter', 1);
             INSERT INTO item_inventory VALUES (1, 1, 9, 10);",
        )
        .unwrap();
        let sets = db.load_reference_sets().unwrap();
        let classification = classify(&sets).unwrap();

        let character = &sets.characters[&1];
        let assessment = assess_character(character, &classification, &SlotPartition::default());
        assert!(!assessment.has_personal_items);
        assert!(assessment.has_external_storage);
        assert!(!assessment.suspected_damage);
    }

    #[test]
    fn test_unknown_slots_count_towards_total_only() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE characters (id INTEGER PRIMARY KEY);
             CREATE TABLE item_inventory (item_id INTEGER, owner_id INTEGER, inv_type INTEGER, template_id INTEGER);
             INSERT INTO characters VALUES (1);
             INSERT INTO item_inventory VALUES (1, 1, 40, 10);",
        )
        .unwrap();
        let sets = db.load_reference_sets().unwrap();
        let classification = classify(&sets).unwrap();

        let report = detect_damage(&sets, &classification, &SlotPartition::default());
        assert!(report.affected.is_empty());
    }
}
