//! Inventory slot type lookup
//!
//! Slot codes are stored in `item_inventory.inv_type`. Codes on the
//! character's person are Personal; everything else lives in a placed
//! structure and is ExternalStorage.

use crate::config::InventoryConfig;
use serde::Serialize;
use std::collections::BTreeSet;

/// Which side of the personal/external split a slot type falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotCategory {
    Personal,
    ExternalStorage,
}

impl std::fmt::Display for SlotCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotCategory::Personal => write!(f, "Personal"),
            SlotCategory::ExternalStorage => write!(f, "External Storage"),
        }
    }
}

/// Known slot codes and their display names
pub const INVENTORY_TYPES: &[(i64, &str)] = &[
    (0, "Player Inventory"),
    (1, "Player Hotbar"),
    (2, "Equipment Slots"),
    (3, "Loot Bag"),
    (4, "Large Chest"),
    (5, "Small Chest"),
    (6, "Reinforced Chest"),
    (7, "Armorer's Bench"),
    (8, "Blacksmith's Bench"),
    (9, "Carpenter's Bench"),
    (10, "Tannery"),
    (11, "Alchemist's Bench"),
    (12, "Firebowl Cauldron"),
    (13, "Furnace"),
    (14, "Improved Furnace"),
    (15, "Preservation Box"),
    (16, "Fluid Press"),
    (17, "Compost Heap"),
    (18, "Dryer"),
    (19, "Wheel of Pain"),
    (20, "Torturer's Worktable"),
    (21, "Map Room"),
    (22, "Vault"),
    (23, "Animal Pen"),
    (24, "Stable"),
    (25, "Improved Animal Pen"),
    (26, "Large Animal Pen"),
];

/// Display name for a slot code
pub fn slot_name(code: i64) -> String {
    INVENTORY_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("Type {}", code))
}

/// The personal/external partition of slot codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPartition {
    personal: BTreeSet<i64>,
    external: BTreeSet<i64>,
}

impl Default for SlotPartition {
    fn default() -> Self {
        Self::from_config(&InventoryConfig::default())
    }
}

impl SlotPartition {
    pub fn from_config(config: &InventoryConfig) -> Self {
        Self {
            personal: config.personal_slots.iter().copied().collect(),
            external: config.external_slots.iter().copied().collect(),
        }
    }

    /// Category of a slot code; unknown codes belong to neither side
    pub fn category(&self, code: i64) -> Option<SlotCategory> {
        if self.personal.contains(&code) {
            Some(SlotCategory::Personal)
        } else if self.external.contains(&code) {
            Some(SlotCategory::ExternalStorage)
        } else {
            None
        }
    }

    pub fn personal(&self) -> &BTreeSet<i64> {
        &self.personal
    }

    pub fn external(&self) -> &BTreeSet<i64> {
        &self.external
    }
}
