//! Reference set loading
//!
//! Reads the raw id sets that ownership classification works from. Each set
//! comes from one query and nothing here cross-references the sets.

use super::schema::{
    Database, GameSchema, BUILDING_PIECE_TABLE, BUILDING_TABLE, GUILD_TABLE, ITEM_TABLE,
    STRUCTURE_TABLE,
};
use crate::error::{Result, VaultkeeperError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// A row of the character table
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CharacterRecord {
    pub id: i64,
    pub name: Option<String>,
    pub level: Option<i64>,
    /// True when the character is alive, when the flag is NULL, or when
    /// the table has no alive flag at all
    pub is_alive: bool,
}

impl CharacterRecord {
    /// Name for reports, falling back to the numeric id
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("ID:{}", self.id),
        }
    }
}

/// A row of the guild table
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GuildRecord {
    pub id: i64,
    pub name: Option<String>,
    pub owner: Option<i64>,
}

/// Item rows grouped by owner reference and inventory slot type
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ItemAggregate {
    pub owner_id: i64,
    pub inv_type: i64,
    pub item_count: u64,
}

/// Building records grouped by owner reference
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct BuildingAggregate {
    pub owner_id: i64,
    pub building_count: u64,
    pub piece_count: u64,
    /// Buildings with no instance rows (chests, stations, decorations);
    /// always 0 when the instance table is unavailable
    pub placeable_count: u64,
}

/// The independent id sets loaded from one database snapshot
#[derive(Debug, Clone)]
pub struct ReferenceSets {
    pub schema: GameSchema,
    pub characters: BTreeMap<i64, CharacterRecord>,
    pub structure_ids: BTreeSet<i64>,
    pub guilds: BTreeMap<i64, GuildRecord>,
    /// Every distinct owner reference seen in item and building rows,
    /// including the reserved `0`
    pub owner_refs: BTreeSet<i64>,
    pub items: Vec<ItemAggregate>,
    pub buildings: Vec<BuildingAggregate>,
}

impl ReferenceSets {
    /// Valid character ids
    pub fn character_ids(&self) -> BTreeSet<i64> {
        self.characters.keys().copied().collect()
    }

    /// Valid guild ids
    pub fn guild_ids(&self) -> BTreeSet<i64> {
        self.guilds.keys().copied().collect()
    }
}

impl Database {
    /// Load every reference set needed for classification
    pub fn load_reference_sets(&self) -> Result<ReferenceSets> {
        let schema = self.discover_schema()?;

        let characters = self.load_characters(&schema)?;
        let structure_ids = if schema.has_structures {
            self.load_structure_ids()?
        } else {
            BTreeSet::new()
        };
        let guilds = if schema.has_guilds {
            self.load_guilds(&schema)?
        } else {
            BTreeMap::new()
        };
        let items = self.load_item_aggregates()?;
        let buildings = if schema.has_buildings {
            self.load_building_aggregates(schema.has_building_pieces)?
        } else {
            Vec::new()
        };

        let owner_refs: BTreeSet<i64> = items
            .iter()
            .map(|a| a.owner_id)
            .chain(buildings.iter().map(|b| b.owner_id))
            .collect();

        info!(
            characters = characters.len(),
            structures = structure_ids.len(),
            guilds = guilds.len(),
            owner_refs = owner_refs.len(),
            "loaded reference sets"
        );

        Ok(ReferenceSets {
            schema,
            characters,
            structure_ids,
            guilds,
            owner_refs,
            items,
            buildings,
        })
    }

    fn load_characters(&self, schema: &GameSchema) -> Result<BTreeMap<i64, CharacterRecord>> {
        let name = if schema.has_name_column { "char_name" } else { "NULL" };
        let level = if schema.has_level_column { "level" } else { "NULL" };
        let alive = if schema.has_alive_column { "isAlive" } else { "1" };
        let sql = format!(
            "SELECT id, {}, {}, {} FROM {}",
            name, level, alive, schema.character_table
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| VaultkeeperError::data_access(&schema.character_table, e.to_string()))?;
        let characters = stmt
            .query_map([], |row| {
                let alive: Option<i64> = row.get(3)?;
                Ok(CharacterRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    level: row.get(2)?,
                    // Unknown liveness is scanned like a live character
                    is_alive: alive.unwrap_or(1) != 0,
                })
            })
            .and_then(|rows| {
                rows.map(|r| r.map(|c| (c.id, c)))
                    .collect::<std::result::Result<BTreeMap<_, _>, _>>()
            })
            .map_err(|e| VaultkeeperError::data_access(&schema.character_table, e.to_string()))?;
        debug!(count = characters.len(), "loaded characters");
        Ok(characters)
    }

    fn load_structure_ids(&self) -> Result<BTreeSet<i64>> {
        let sql = format!("SELECT id FROM {} WHERE id IS NOT NULL", STRUCTURE_TABLE);
        self.load_id_set(&sql, STRUCTURE_TABLE)
    }

    fn load_guilds(&self, schema: &GameSchema) -> Result<BTreeMap<i64, GuildRecord>> {
        let name = if schema.has_guild_name_column { "name" } else { "NULL" };
        let owner = if schema.has_guild_owner_column { "owner" } else { "NULL" };
        let sql = format!(
            "SELECT guildId, {}, {} FROM {} WHERE guildId IS NOT NULL",
            name, owner, GUILD_TABLE
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| VaultkeeperError::data_access(GUILD_TABLE, e.to_string()))?;
        let guilds = stmt
            .query_map([], |row| {
                Ok(GuildRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    owner: row.get(2)?,
                })
            })
            .and_then(|rows| {
                rows.map(|r| r.map(|g| (g.id, g)))
                    .collect::<std::result::Result<BTreeMap<_, _>, _>>()
            })
            .map_err(|e| VaultkeeperError::data_access(GUILD_TABLE, e.to_string()))?;
        Ok(guilds)
    }

    fn load_item_aggregates(&self) -> Result<Vec<ItemAggregate>> {
        let sql = format!(
            "SELECT owner_id, inv_type, COUNT(*) FROM {}
             WHERE owner_id IS NOT NULL
             GROUP BY owner_id, inv_type
             ORDER BY owner_id, inv_type",
            ITEM_TABLE
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| VaultkeeperError::data_access(ITEM_TABLE, e.to_string()))?;
        let items = stmt
            .query_map([], |row| {
                let inv_type: Option<i64> = row.get(1)?;
                let count: i64 = row.get(2)?;
                Ok(ItemAggregate {
                    owner_id: row.get(0)?,
                    inv_type: inv_type.unwrap_or(-1),
                    item_count: count as u64,
                })
            })
            .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
            .map_err(|e| VaultkeeperError::data_access(ITEM_TABLE, e.to_string()))?;
        Ok(items)
    }

    fn load_building_aggregates(&self, with_pieces: bool) -> Result<Vec<BuildingAggregate>> {
        // A building without instance rows is a placeable
        let sql = if with_pieces {
            format!(
                "SELECT b.owner_id, COUNT(*), COALESCE(SUM(p.pieces), 0),
                        SUM(CASE WHEN p.pieces IS NULL THEN 1 ELSE 0 END)
                 FROM {} b
                 LEFT JOIN (SELECT object_id, COUNT(*) AS pieces FROM {} GROUP BY object_id) p
                    ON p.object_id = b.object_id
                 WHERE b.owner_id IS NOT NULL
                 GROUP BY b.owner_id",
                BUILDING_TABLE, BUILDING_PIECE_TABLE
            )
        } else {
            format!(
                "SELECT owner_id, COUNT(*), 0, 0 FROM {} WHERE owner_id IS NOT NULL GROUP BY owner_id",
                BUILDING_TABLE
            )
        };

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| VaultkeeperError::data_access(BUILDING_TABLE, e.to_string()))?;
        let buildings = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                let pieces: i64 = row.get(2)?;
                let placeables: i64 = row.get(3)?;
                Ok(BuildingAggregate {
                    owner_id: row.get(0)?,
                    building_count: count as u64,
                    piece_count: pieces as u64,
                    placeable_count: placeables as u64,
                })
            })
            .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
            .map_err(|e| VaultkeeperError::data_access(BUILDING_TABLE, e.to_string()))?;
        Ok(buildings)
    }

    fn load_id_set(&self, sql: &str, table: &str) -> Result<BTreeSet<i64>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| VaultkeeperError::data_access(table, e.to_string()))?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<std::result::Result<BTreeSet<i64>, _>>())
            .map_err(|e| VaultkeeperError::data_access(table, e.to_string()))?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    #[test]
    fn test_load_full_fixture() {
        let db = fixtures::game_db();
        let sets = db.load_reference_sets().unwrap();

        assert_eq!(sets.character_ids(), BTreeSet::from([1, 2, 3]));
        assert_eq!(sets.structure_ids, BTreeSet::from([100, 101]));
        assert_eq!(sets.guild_ids(), BTreeSet::from([500]));
        assert_eq!(
            sets.owner_refs,
            BTreeSet::from([0, 1, 2, 100, 101, 500, 777, 900, 901, 902, 950])
        );
        assert!(!sets.characters[&3].is_alive);
        assert_eq!(sets.characters[&1].display_name(), "Conan");
    }

    #[test]
    fn test_building_piece_counts() {
        let db = fixtures::game_db();
        let sets = db.load_reference_sets().unwrap();

        let orphan_building = sets
            .buildings
            .iter()
            .find(|b| b.owner_id == 777)
            .unwrap();
        assert_eq!(orphan_building.building_count, 1);
        assert_eq!(orphan_building.piece_count, 1);

        let conan = sets.buildings.iter().find(|b| b.owner_id == 1).unwrap();
        assert_eq!(conan.piece_count, 3);
        assert_eq!(conan.placeable_count, 0);
    }

    #[test]
    fn test_buildings_without_instances_are_placeables() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE characters (id INTEGER PRIMARY KEY);
             CREATE TABLE item_inventory (item_id INTEGER, owner_id INTEGER, inv_type INTEGER, template_id INTEGER);
             CREATE TABLE buildings (object_id INTEGER PRIMARY KEY, owner_id INTEGER);
             CREATE TABLE building_instances (object_id INTEGER, instance_id INTEGER);
             INSERT INTO characters (id) VALUES (1);
             INSERT INTO buildings VALUES (10, 1), (11, 1), (12, 1);
             INSERT INTO building_instances VALUES (10, 1), (10, 2);",
        )
        .unwrap();

        let sets = db.load_reference_sets().unwrap();
        assert_eq!(
            sets.buildings,
            vec![BuildingAggregate {
                owner_id: 1,
                building_count: 3,
                piece_count: 2,
                placeable_count: 2,
            }]
        );
    }

    #[test]
    fn test_row_errors_name_the_table() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE characters (id INTEGER PRIMARY KEY);
             CREATE TABLE item_inventory (item_id INTEGER, owner_id, inv_type INTEGER, template_id INTEGER);
             INSERT INTO item_inventory VALUES (1, 'abc', 0, 10);",
        )
        .unwrap();

        match db.load_reference_sets() {
            Err(VaultkeeperError::DataAccess { table, .. }) => assert_eq!(table, ITEM_TABLE),
            other => panic!("expected DataAccess error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_guild_table_without_owner_column() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE characters (id INTEGER PRIMARY KEY);
             CREATE TABLE item_inventory (item_id INTEGER, owner_id INTEGER, inv_type INTEGER, template_id INTEGER);
             CREATE TABLE guilds (guildId INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO guilds VALUES (500, 'Ravens');",
        )
        .unwrap();

        let sets = db.load_reference_sets().unwrap();
        assert_eq!(
            sets.guilds[&500],
            GuildRecord {
                id: 500,
                name: Some("Ravens".to_string()),
                owner: None,
            }
        );
    }

    #[test]
    fn test_item_aggregates_grouped_by_slot() {
        let db = fixtures::game_db();
        let sets = db.load_reference_sets().unwrap();

        let chest: Vec<_> = sets.items.iter().filter(|a| a.owner_id == 100).collect();
        assert_eq!(chest.len(), 1);
        assert_eq!(chest[0].inv_type, 4);
        assert_eq!(chest[0].item_count, 3);
    }

    #[test]
    fn test_degrades_without_optional_tables() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE characters (id INTEGER PRIMARY KEY);
             CREATE TABLE item_inventory (item_id INTEGER, owner_id INTEGER, inv_type INTEGER, template_id INTEGER);
             INSERT INTO characters (id) VALUES (1);
             INSERT INTO item_inventory VALUES (1, 1, 0, 10), (1, 42, 4, 11);",
        )
        .unwrap();

        let sets = db.load_reference_sets().unwrap();
        assert!(sets.structure_ids.is_empty());
        assert!(sets.guilds.is_empty());
        assert!(sets.buildings.is_empty());
        assert_eq!(sets.owner_refs, BTreeSet::from([1, 42]));
        // Without an alive flag every character counts as active
        assert!(sets.characters[&1].is_alive);
        assert_eq!(sets.characters[&1].display_name(), "ID:1");
    }
}
