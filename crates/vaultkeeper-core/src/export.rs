//! CSV export of orphaned owners and affected players

use crate::error::Result;
use crate::ownership::{slot_name, AffectedPlayer, OrphanedOwner};
use std::io::Write;

fn join_slots(slots: impl IntoIterator<Item = i64>) -> String {
    slots
        .into_iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// One row per orphaned owner, most items first
pub fn write_orphans_csv<W: Write>(out: W, owners: &[OrphanedOwner]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "owner_id",
        "item_count",
        "slot_type_count",
        "template_count",
        "slot_types",
    ])?;
    for owner in owners {
        writer.write_record([
            owner.owner_id.to_string(),
            owner.item_count.to_string(),
            owner.slot_type_count.to_string(),
            owner.template_count.to_string(),
            join_slots(owner.slot_types.iter().copied()),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per flagged character
pub fn write_affected_csv<W: Write>(out: W, affected: &[AffectedPlayer]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "character_id",
        "name",
        "level",
        "status",
        "remaining_items",
        "has_personal_items",
        "has_external_storage",
        "slot_types",
    ])?;
    for player in affected {
        let slots: Vec<String> = player.slot_types.iter().map(|&s| slot_name(s)).collect();
        writer.write_record([
            player.character_id.to_string(),
            player.display_name.clone(),
            player.level.map(|l| l.to_string()).unwrap_or_default(),
            player.status.map(|s| s.to_string()).unwrap_or_default(),
            player.remaining_item_total.to_string(),
            player.has_personal_items.to_string(),
            player.has_external_storage.to_string(),
            slots.join(";"),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
