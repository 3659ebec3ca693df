//! Database layer for vaultkeeper
//!
//! Wraps the game server's SQLite file with:
//! - schema discovery for the character, item, structure and guild tables
//! - reference set loading for ownership classification
//! - maintenance statements (transactional DELETE, VACUUM)

mod loader;
mod schema;
mod stats;

#[cfg(test)]
pub(crate) mod fixtures;

pub use loader::{BuildingAggregate, CharacterRecord, GuildRecord, ItemAggregate, ReferenceSets};
pub use schema::{
    Database, GameSchema, Row, BUILDING_PIECE_TABLE, BUILDING_TABLE, CHARACTER_TABLE_CANDIDATES,
    GUILD_TABLE, ITEM_TABLE, STRUCTURE_TABLE,
};
pub use stats::DatabaseStats;
