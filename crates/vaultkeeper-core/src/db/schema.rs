//! Database handle and game schema discovery

use crate::error::{Result, VaultkeeperError};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// Main database handle
pub struct Database {
    pub(crate) conn: Connection,
}

/// Item ownership table
pub const ITEM_TABLE: &str = "item_inventory";
/// Placed world objects; every row id is a structure reference
pub const STRUCTURE_TABLE: &str = "actor_position";
pub const GUILD_TABLE: &str = "guilds";
pub const BUILDING_TABLE: &str = "buildings";
pub const BUILDING_PIECE_TABLE: &str = "building_instances";

/// Character table names seen across server versions, in lookup order
pub const CHARACTER_TABLE_CANDIDATES: [&str; 3] = ["characters", "character", "players"];

const ITEM_COLUMNS: [&str; 3] = ["owner_id", "inv_type", "template_id"];

/// A row returned by [`Database::query_rows`]: ordered column/value pairs
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Look up a column value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Look up an integer column by name
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Which tables and columns the connected database provides
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GameSchema {
    pub character_table: String,
    pub has_name_column: bool,
    pub has_level_column: bool,
    pub has_alive_column: bool,
    pub has_structures: bool,
    pub has_guilds: bool,
    pub has_guild_name_column: bool,
    pub has_guild_owner_column: bool,
    pub has_buildings: bool,
    pub has_building_pieces: bool,
}

impl Database {
    /// Open an existing database file. The file is never created: a missing
    /// path is an input error, not an empty database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VaultkeeperError::InvalidInput(format!(
                "database file not found: {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        debug!(path = %path.display(), "opened database");
        Ok(Self { conn })
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Run a literal batch of statements
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run a single literal statement and return the affected-row count
    pub fn execute(&self, sql: &str) -> Result<usize> {
        Ok(self.conn.execute(sql, [])?)
    }

    /// Run a literal query and return every row as ordered column/value pairs
    pub fn query_rows(&self, sql: &str) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let rows = stmt
            .query_map([], |row| {
                let mut columns = Vec::with_capacity(names.len());
                for (i, name) in names.iter().enumerate() {
                    columns.push((name.clone(), row.get::<_, Value>(i)?));
                }
                Ok(Row { columns })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Check whether a table exists
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List the column names of a table (empty when the table is absent)
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(columns)
    }

    /// Resolve the character and item tables and check the optional ones.
    ///
    /// Fails only when the item table or every character table candidate is
    /// missing; optional tables degrade the classification.
    pub fn discover_schema(&self) -> Result<GameSchema> {
        if !self.table_exists(ITEM_TABLE)? {
            return Err(VaultkeeperError::data_access(ITEM_TABLE, "table not found"));
        }
        let item_columns = self.columns(ITEM_TABLE)?;
        for required in ITEM_COLUMNS {
            if !item_columns.iter().any(|c| c == required) {
                return Err(VaultkeeperError::data_access(
                    ITEM_TABLE,
                    format!("column '{}' not found", required),
                ));
            }
        }

        let mut character_table = None;
        for candidate in CHARACTER_TABLE_CANDIDATES {
            if self.table_exists(candidate)? {
                character_table = Some(candidate.to_string());
                break;
            }
        }
        let character_table = character_table.ok_or_else(|| {
            VaultkeeperError::data_access(
                CHARACTER_TABLE_CANDIDATES.join("|"),
                "no character table found",
            )
        })?;

        let char_columns = self.columns(&character_table)?;
        if !char_columns.iter().any(|c| c == "id") {
            return Err(VaultkeeperError::data_access(
                &character_table,
                "column 'id' not found",
            ));
        }

        let structure_columns = self.optional_columns(STRUCTURE_TABLE, &["id"])?;
        let guild_columns = self.optional_columns(GUILD_TABLE, &["guildId"])?;
        let building_columns = self.optional_columns(BUILDING_TABLE, &["owner_id"])?;
        let has_building_pieces = match &building_columns {
            Some(columns) if columns.iter().any(|c| c == "object_id") => self
                .optional_columns(BUILDING_PIECE_TABLE, &["object_id"])?
                .is_some(),
            Some(_) => {
                warn!(
                    table = BUILDING_TABLE,
                    "column 'object_id' not found; building piece counts disabled"
                );
                false
            }
            None => false,
        };

        if structure_columns.is_none() {
            warn!(
                table = STRUCTURE_TABLE,
                "structure table unusable; structure-owned items will not be recognised"
            );
        }
        if guild_columns.is_none() {
            warn!(table = GUILD_TABLE, "guild table unusable; guild ownership disabled");
        }
        let guild_has = |name: &str| {
            guild_columns
                .as_ref()
                .is_some_and(|columns| columns.iter().any(|c| c == name))
        };

        Ok(GameSchema {
            has_name_column: char_columns.iter().any(|c| c == "char_name"),
            has_level_column: char_columns.iter().any(|c| c == "level"),
            has_alive_column: char_columns.iter().any(|c| c == "isAlive"),
            character_table,
            has_structures: structure_columns.is_some(),
            has_guild_name_column: guild_has("name"),
            has_guild_owner_column: guild_has("owner"),
            has_guilds: guild_columns.is_some(),
            has_buildings: building_columns.is_some(),
            has_building_pieces,
        })
    }

    /// Columns of an optional table, or `None` when the table is absent or
    /// lacks one of its key columns
    fn optional_columns(&self, table: &str, keys: &[&str]) -> Result<Option<Vec<String>>> {
        if !self.table_exists(table)? {
            debug!(table, "optional table not present");
            return Ok(None);
        }
        let columns = self.columns(table)?;
        if let Some(missing) = keys.iter().find(|k| !columns.iter().any(|c| c == *k)) {
            warn!(table, column = *missing, "key column not found; ignoring table");
            return Ok(None);
        }
        Ok(Some(columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.table_exists(ITEM_TABLE).unwrap());
    }

    #[test]
    fn test_open_missing_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = Database::open(dir.path().join("game.db"));
        assert!(matches!(result, Err(VaultkeeperError::InvalidInput(_))));
        assert!(!dir.path().join("game.db").exists());
    }

    #[test]
    fn test_discover_full_schema() {
        let db = fixtures::game_db();
        let schema = db.discover_schema().unwrap();
        assert_eq!(schema.character_table, "characters");
        assert!(schema.has_name_column);
        assert!(schema.has_alive_column);
        assert!(schema.has_structures);
        assert!(schema.has_guilds);
        assert!(schema.has_guild_owner_column);
        assert!(schema.has_buildings);
        assert!(schema.has_building_pieces);
    }

    #[test]
    fn test_discover_minimal_schema() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE players (id INTEGER PRIMARY KEY);
             CREATE TABLE item_inventory (item_id INTEGER, owner_id INTEGER, inv_type INTEGER, template_id INTEGER);",
        )
        .unwrap();

        let schema = db.discover_schema().unwrap();
        assert_eq!(schema.character_table, "players");
        assert!(!schema.has_name_column);
        assert!(!schema.has_alive_column);
        assert!(!schema.has_structures);
        assert!(!schema.has_guilds);
        assert!(!schema.has_buildings);
    }

    #[test]
    fn test_optional_tables_without_key_columns_are_ignored() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE characters (id INTEGER PRIMARY KEY);
             CREATE TABLE item_inventory (item_id INTEGER, owner_id INTEGER, inv_type INTEGER, template_id INTEGER);
             CREATE TABLE actor_position (x REAL, y REAL);
             CREATE TABLE guilds (guildId INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE buildings (owner_id INTEGER);
             CREATE TABLE building_instances (object_id INTEGER);",
        )
        .unwrap();

        let schema = db.discover_schema().unwrap();
        assert!(!schema.has_structures);
        assert!(schema.has_guilds);
        assert!(schema.has_guild_name_column);
        assert!(!schema.has_guild_owner_column);
        assert!(schema.has_buildings);
        assert!(!schema.has_building_pieces);
    }

    #[test]
    fn test_missing_item_table() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch("CREATE TABLE characters (id INTEGER PRIMARY KEY);")
            .unwrap();

        match db.discover_schema() {
            Err(VaultkeeperError::DataAccess { table, .. }) => assert_eq!(table, ITEM_TABLE),
            other => panic!("expected DataAccess error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_character_table() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE item_inventory (item_id INTEGER, owner_id INTEGER, inv_type INTEGER, template_id INTEGER);",
        )
        .unwrap();
        assert!(matches!(
            db.discover_schema(),
            Err(VaultkeeperError::DataAccess { .. })
        ));
    }

    #[test]
    fn test_missing_item_column() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE characters (id INTEGER PRIMARY KEY);
             CREATE TABLE item_inventory (item_id INTEGER, owner_id INTEGER);",
        )
        .unwrap();
        match db.discover_schema() {
            Err(VaultkeeperError::DataAccess { reason, .. }) => {
                assert!(reason.contains("inv_type"))
            }
            other => panic!("expected DataAccess error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_query_rows_named_columns() {
        let db = fixtures::game_db();
        let rows = db
            .query_rows("SELECT id, char_name FROM characters ORDER BY id")
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get_i64("id"), Some(1));
        assert_eq!(
            rows[0].get("char_name"),
            Some(&Value::Text("Conan".to_string()))
        );
        assert_eq!(rows[0].columns[0].0, "id");
    }
}
