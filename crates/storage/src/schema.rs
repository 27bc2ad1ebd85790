use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    token_hash BLOB NOT NULL UNIQUE CHECK (length(token_hash) = 32)
);

CREATE TABLE IF NOT EXISTS parties (
    party_id TEXT PRIMARY KEY,
    shortcode TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    owner_id TEXT REFERENCES users (user_id),
    edit_key_hash BLOB CHECK (edit_key_hash IS NULL OR length(edit_key_hash) = 32),
    created_at INTEGER NOT NULL DEFAULT (unixepoch()),
    CHECK ((owner_id IS NULL) <> (edit_key_hash IS NULL))
);

CREATE TABLE IF NOT EXISTS grid_items (
    item_id TEXT PRIMARY KEY,
    party_id TEXT NOT NULL REFERENCES parties (party_id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('weapon', 'summon', 'character')),
    catalog_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    uncap_level INTEGER NOT NULL CHECK (uncap_level >= 0),
    transcendence_step INTEGER NOT NULL DEFAULT 0 CHECK (transcendence_step BETWEEN 0 AND 5),
    element INTEGER,
    UNIQUE (party_id, kind, position)
);
CREATE INDEX IF NOT EXISTS idx_grid_items_party ON grid_items (party_id, kind, position);
";
