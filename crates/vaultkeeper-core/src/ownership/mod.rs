//! Ownership reconciliation
//!
//! Classifies owner references, decomposes the orphaned ids into ranges,
//! detects damage from earlier cleanups and gathers orphan forensics.

mod classifier;
mod damage;
pub mod forensics;
pub mod inventory;
mod ranges;

/// A value stored in an owner column. It has no type of its own; meaning
/// comes only from classification.
pub type OwnerRef = i64;

pub use classifier::{
    classify, partition, ClassCounts, ClassKind, Classification, OwnerItems, OwnershipClass,
    Partition, UNOWNED,
};
pub use damage::{assess_character, detect_damage, AffectedPlayer, DamageReport, DamageStatus};
pub use forensics::{investigate, Forensics, OrphanedOwner, SlotDistribution, TableTrace, TemplateCount};
pub use inventory::{slot_name, SlotCategory, SlotPartition, INVENTORY_TYPES};
pub use ranges::{analyze_patterns, decompose, merge_ranges, IdPatternReport, IdRange};
