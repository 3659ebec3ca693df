//! In-memory game databases for unit tests

use super::Database;

pub(crate) const GAME_SCHEMA: &str = r#"
CREATE TABLE characters (
    id INTEGER PRIMARY KEY,
    playerId TEXT,
    char_name TEXT,
    level INTEGER,
    isAlive INTEGER,
    lastTimeOnline INTEGER
);
CREATE TABLE item_inventory (
    item_id INTEGER,
    owner_id INTEGER,
    inv_type INTEGER,
    template_id INTEGER,
    data BLOB,
    PRIMARY KEY (item_id, owner_id)
);
CREATE TABLE actor_position (
    class TEXT,
    map TEXT,
    id INTEGER PRIMARY KEY,
    x REAL, y REAL, z REAL
);
CREATE TABLE guilds (
    guildId INTEGER PRIMARY KEY,
    name TEXT,
    owner INTEGER
);
CREATE TABLE buildings (
    object_id INTEGER PRIMARY KEY,
    owner_id INTEGER
);
CREATE TABLE building_instances (
    object_id INTEGER,
    instance_id INTEGER
);
"#;

/// Three characters (1, 2 alive; 3 dead), chests 100 and 101, guild 500,
/// orphaned item owners 900-902 and 950, an orphaned building owner 777 and
/// one unowned (owner 0) item.
pub(crate) const GAME_ROWS: &str = r#"
INSERT INTO characters (id, playerId, char_name, level, isAlive, lastTimeOnline) VALUES
    (1, 'p1', 'Conan', 60, 1, 1700000000),
    (2, 'p2', 'Valeria', 42, 1, 1700000100),
    (3, 'p3', 'Subotai', 12, 0, 1600000000);

INSERT INTO actor_position (class, map, id, x, y, z) VALUES
    ('BP_LargeChest', 'ConanSandbox', 100, 0, 0, 0),
    ('BP_Furnace', 'ConanSandbox', 101, 1, 1, 1);

INSERT INTO guilds (guildId, name, owner) VALUES (500, 'Brotherhood', 1);

INSERT INTO item_inventory (item_id, owner_id, inv_type, template_id) VALUES
    (1, 1, 0, 10), (2, 1, 1, 11), (3, 1, 4, 12),
    (1, 2, 0, 10), (2, 2, 7, 13),
    (1, 100, 4, 20), (2, 100, 4, 21), (3, 100, 4, 22),
    (1, 101, 8, 23), (2, 101, 8, 24),
    (1, 900, 0, 10), (2, 900, 1, 11),
    (1, 901, 0, 10),
    (1, 902, 5, 30),
    (1, 950, 1, 10),
    (1, 0, 0, 99);

INSERT INTO buildings (object_id, owner_id) VALUES (100, 1), (101, 500), (102, 777);
INSERT INTO building_instances (object_id, instance_id) VALUES
    (100, 1), (100, 2), (100, 3),
    (101, 1), (101, 2),
    (102, 1);
"#;

/// Fully populated game database
pub(crate) fn game_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.execute_batch(GAME_SCHEMA).unwrap();
    db.execute_batch(GAME_ROWS).unwrap();
    db
}
