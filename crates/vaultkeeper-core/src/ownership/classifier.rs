//! Ownership classification
//!
//! Every owner reference seen in item and building rows lands in exactly one
//! class. The classes are computed as set differences and intersections over
//! all known reference spaces at once, never as a per-row "does this id
//! exist in table X" check: an item sitting in a chest has the chest's id as
//! its owner, and a single negative check against the character table would
//! call it orphaned.
//!
//! Reference spaces may share ids. Precedence is character, then guild, then
//! structure, so the partition stays disjoint even when they do.

use super::OwnerRef;
use crate::db::ReferenceSets;
use crate::error::{Result, VaultkeeperError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Reserved "no owner" reference, excluded from classification
pub const UNOWNED: OwnerRef = 0;

/// What an owner reference points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum OwnershipClass {
    ActiveCharacter {
        character_id: i64,
        display_name: String,
        level: Option<i64>,
    },
    Structure {
        structure_id: i64,
    },
    Guild {
        guild_id: i64,
        guild_name: String,
        owning_character: Option<i64>,
    },
    Orphaned {
        raw_id: i64,
    },
}

impl OwnershipClass {
    pub fn kind(&self) -> ClassKind {
        match self {
            OwnershipClass::ActiveCharacter { .. } => ClassKind::ActiveCharacter,
            OwnershipClass::Structure { .. } => ClassKind::Structure,
            OwnershipClass::Guild { .. } => ClassKind::Guild,
            OwnershipClass::Orphaned { .. } => ClassKind::Orphaned,
        }
    }
}

/// Fieldless discriminant of [`OwnershipClass`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    ActiveCharacter,
    Structure,
    Guild,
    Orphaned,
}

impl ClassKind {
    pub const ALL: [ClassKind; 4] = [
        ClassKind::ActiveCharacter,
        ClassKind::Structure,
        ClassKind::Guild,
        ClassKind::Orphaned,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ClassKind::ActiveCharacter => "active character",
            ClassKind::Structure => "structure",
            ClassKind::Guild => "guild",
            ClassKind::Orphaned => "orphaned",
        }
    }
}

/// A count per ownership class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassCounts {
    pub active_character: u64,
    pub structure: u64,
    pub guild: u64,
    pub orphaned: u64,
}

impl ClassCounts {
    pub fn get(&self, kind: ClassKind) -> u64 {
        match kind {
            ClassKind::ActiveCharacter => self.active_character,
            ClassKind::Structure => self.structure,
            ClassKind::Guild => self.guild,
            ClassKind::Orphaned => self.orphaned,
        }
    }

    pub fn add(&mut self, kind: ClassKind, n: u64) {
        match kind {
            ClassKind::ActiveCharacter => self.active_character += n,
            ClassKind::Structure => self.structure += n,
            ClassKind::Guild => self.guild += n,
            ClassKind::Orphaned => self.orphaned += n,
        }
    }

    pub fn total(&self) -> u64 {
        self.active_character + self.structure + self.guild + self.orphaned
    }
}

/// The four disjoint reference sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub characters: BTreeSet<OwnerRef>,
    pub structures: BTreeSet<OwnerRef>,
    pub guilds: BTreeSet<OwnerRef>,
    pub orphaned: BTreeSet<OwnerRef>,
}

impl Partition {
    pub fn get(&self, kind: ClassKind) -> &BTreeSet<OwnerRef> {
        match kind {
            ClassKind::ActiveCharacter => &self.characters,
            ClassKind::Structure => &self.structures,
            ClassKind::Guild => &self.guilds,
            ClassKind::Orphaned => &self.orphaned,
        }
    }

    /// Check that the classes are pairwise disjoint and cover `refs` minus
    /// the unowned reference.
    pub fn verify(&self, refs: &BTreeSet<OwnerRef>) -> Result<()> {
        let mut seen: BTreeMap<OwnerRef, ClassKind> = BTreeMap::new();
        for kind in ClassKind::ALL {
            for &reference in self.get(kind) {
                if let Some(previous) = seen.insert(reference, kind) {
                    return Err(VaultkeeperError::ClassificationInconsistency {
                        reference,
                        classes: format!("{}, {}", previous.label(), kind.label()),
                    });
                }
            }
        }

        for &reference in refs {
            if reference != UNOWNED && !seen.contains_key(&reference) {
                return Err(VaultkeeperError::ClassificationInconsistency {
                    reference,
                    classes: "none".to_string(),
                });
            }
        }
        if let Some((&reference, kind)) = seen.iter().find(|(r, _)| !refs.contains(*r)) {
            return Err(VaultkeeperError::ClassificationInconsistency {
                reference,
                classes: format!("{} (not an observed reference)", kind.label()),
            });
        }
        if seen.contains_key(&UNOWNED) {
            return Err(VaultkeeperError::ClassificationInconsistency {
                reference: UNOWNED,
                classes: "reserved reference was classified".to_string(),
            });
        }
        Ok(())
    }
}

/// Partition observed owner references against the known reference spaces
pub fn partition(
    refs: &BTreeSet<OwnerRef>,
    character_ids: &BTreeSet<i64>,
    structure_ids: &BTreeSet<i64>,
    guild_ids: &BTreeSet<i64>,
) -> Partition {
    let owned: BTreeSet<OwnerRef> = refs.iter().copied().filter(|&r| r != UNOWNED).collect();

    let characters: BTreeSet<OwnerRef> = owned.intersection(character_ids).copied().collect();
    let guilds: BTreeSet<OwnerRef> = owned
        .intersection(guild_ids)
        .filter(|r| !character_ids.contains(*r))
        .copied()
        .collect();
    let structures: BTreeSet<OwnerRef> = owned
        .intersection(structure_ids)
        .filter(|r| !character_ids.contains(*r) && !guild_ids.contains(*r))
        .copied()
        .collect();
    let orphaned: BTreeSet<OwnerRef> = owned
        .iter()
        .filter(|r| {
            !character_ids.contains(*r) && !structure_ids.contains(*r) && !guild_ids.contains(*r)
        })
        .copied()
        .collect();

    Partition {
        characters,
        structures,
        guilds,
        orphaned,
    }
}

/// Item rows held by one owner reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OwnerItems {
    pub total: u64,
    pub by_slot: BTreeMap<i64, u64>,
}

impl OwnerItems {
    /// Rows in the given slot types
    pub fn count_in(&self, slots: &BTreeSet<i64>) -> u64 {
        self.by_slot
            .iter()
            .filter(|(slot, _)| slots.contains(*slot))
            .map(|(_, n)| n)
            .sum()
    }
}

/// Result of classifying one database snapshot. Every downstream stage reads
/// ownership from here.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Distinct references per class
    pub references: ClassCounts,
    /// Item rows per class of their owner
    pub item_rows: ClassCounts,
    /// Building records per class of their owner
    pub building_rows: ClassCounts,
    /// Building pieces per class of their owner
    pub building_pieces: ClassCounts,
    /// Buildings without pieces (placed chests and stations) per class
    pub placeables: ClassCounts,
    /// Item rows owned by the reserved reference `0`
    pub unowned_item_rows: u64,
    #[serde(skip)]
    classes: BTreeMap<OwnerRef, OwnershipClass>,
    #[serde(skip)]
    partition: Partition,
    #[serde(skip)]
    owner_items: BTreeMap<OwnerRef, OwnerItems>,
}

impl Classification {
    pub fn class_of(&self, reference: OwnerRef) -> Option<&OwnershipClass> {
        self.classes.get(&reference)
    }

    pub fn classes(&self) -> &BTreeMap<OwnerRef, OwnershipClass> {
        &self.classes
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The orphaned reference set
    pub fn orphaned(&self) -> &BTreeSet<OwnerRef> {
        &self.partition.orphaned
    }

    /// Item rows for one owner, if it owns any
    pub fn items_of(&self, owner: OwnerRef) -> Option<&OwnerItems> {
        self.owner_items.get(&owner)
    }

    /// Item rows summed over a set of owners, optionally limited to slot types
    pub fn item_rows_for(
        &self,
        owners: &BTreeSet<OwnerRef>,
        slots: Option<&BTreeSet<i64>>,
    ) -> u64 {
        owners
            .iter()
            .filter_map(|owner| self.owner_items.get(owner))
            .map(|items| match slots {
                Some(slots) => items.count_in(slots),
                None => items.total,
            })
            .sum()
    }
}

/// Classify every owner reference in the loaded sets
pub fn classify(sets: &ReferenceSets) -> Result<Classification> {
    let partition = partition(
        &sets.owner_refs,
        &sets.character_ids(),
        &sets.structure_ids,
        &sets.guild_ids(),
    );
    partition.verify(&sets.owner_refs)?;

    let mut classes = BTreeMap::new();
    for &id in &partition.characters {
        let character = &sets.characters[&id];
        classes.insert(
            id,
            OwnershipClass::ActiveCharacter {
                character_id: id,
                display_name: character.display_name(),
                level: character.level,
            },
        );
    }
    for &id in &partition.guilds {
        let guild = &sets.guilds[&id];
        classes.insert(
            id,
            OwnershipClass::Guild {
                guild_id: id,
                guild_name: guild.name.clone().unwrap_or_else(|| format!("Guild {}", id)),
                owning_character: guild.owner,
            },
        );
    }
    for &id in &partition.structures {
        classes.insert(id, OwnershipClass::Structure { structure_id: id });
    }
    for &id in &partition.orphaned {
        classes.insert(id, OwnershipClass::Orphaned { raw_id: id });
    }

    let mut references = ClassCounts::default();
    for kind in ClassKind::ALL {
        references.add(kind, partition.get(kind).len() as u64);
    }

    let mut owner_items: BTreeMap<OwnerRef, OwnerItems> = BTreeMap::new();
    let mut item_rows = ClassCounts::default();
    let mut unowned_item_rows = 0;
    for aggregate in &sets.items {
        if aggregate.owner_id == UNOWNED {
            unowned_item_rows += aggregate.item_count;
            continue;
        }
        let entry = owner_items.entry(aggregate.owner_id).or_default();
        entry.total += aggregate.item_count;
        *entry.by_slot.entry(aggregate.inv_type).or_default() += aggregate.item_count;

        if let Some(class) = classes.get(&aggregate.owner_id) {
            item_rows.add(class.kind(), aggregate.item_count);
        }
    }

    let mut building_rows = ClassCounts::default();
    let mut building_pieces = ClassCounts::default();
    let mut placeables = ClassCounts::default();
    for building in &sets.buildings {
        if let Some(class) = classes.get(&building.owner_id) {
            building_rows.add(class.kind(), building.building_count);
            building_pieces.add(class.kind(), building.piece_count);
            placeables.add(class.kind(), building.placeable_count);
        }
    }

    info!(
        characters = references.active_character,
        structures = references.structure,
        guilds = references.guild,
        orphaned = references.orphaned,
        "classified owner references"
    );
    debug!(orphaned_item_rows = item_rows.orphaned, unowned_item_rows, "item rows by class");

    Ok(Classification {
        references,
        item_rows,
        building_rows,
        building_pieces,
        placeables,
        unowned_item_rows,
        classes,
        partition,
        owner_items,
    })
}
