//! SQLite schema definition and structural checks.

use chrono::Utc;
use rusqlite::Connection;
use thiserror::Error;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Tables that must exist and be queryable for the store to be
/// considered structurally valid.
pub const REQUIRED_TABLES: [&str; 6] =
    ["cache_metadata", "files", "frontmatter", "tags", "links", "fulltext"];

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema version {found} is newer than supported {supported}")]
    VersionTooNew { found: i32, supported: i32 },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("structural check failed: {0}")]
    Corrupt(String),
}

/// Initialize or migrate the schema. Idempotent on an existing,
/// structurally valid store.
pub fn init_schema(conn: &Connection) -> Result<(), SchemaError> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version < SCHEMA_VERSION {
        migrate(conn, version)?;
    } else if version > SCHEMA_VERSION {
        return Err(SchemaError::VersionTooNew { found: version, supported: SCHEMA_VERSION });
    }

    Ok(())
}

/// Read the stored schema version; 0 means a fresh database.
pub fn get_schema_version(conn: &Connection) -> Result<i32, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='cache_metadata'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: Option<String> = conn
        .query_row(
            "SELECT value FROM cache_metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    Ok(version.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), SchemaError> {
    conn.execute(
        "INSERT OR REPLACE INTO cache_metadata (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}

/// Verify every required table is present and trivially queryable.
pub fn structural_check(conn: &Connection) -> Result<(), SchemaError> {
    for table in REQUIRED_TABLES {
        let count: Result<i64, rusqlite::Error> =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0));
        if count.is_err() {
            return Err(SchemaError::Corrupt(format!("table '{table}' is not queryable")));
        }
    }
    Ok(())
}

fn create_schema_v1(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(
        r#"
        -- Process-wide metadata: schema version, last successful update
        CREATE TABLE cache_metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- One row per currently-known file; path is the join key
        CREATE TABLE files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            file_name TEXT NOT NULL,
            directory TEXT NOT NULL,
            modified_at TEXT NOT NULL,
            created_at TEXT,
            size_bytes INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            word_count INTEGER NOT NULL DEFAULT 0,
            heading_count INTEGER NOT NULL DEFAULT 0,
            indexed_at TEXT NOT NULL
        );

        CREATE INDEX idx_files_path ON files(path);
        CREATE INDEX idx_files_directory ON files(directory);
        CREATE INDEX idx_files_modified ON files(modified_at);

        -- Frontmatter key/value pairs with inferred kinds
        CREATE TABLE frontmatter (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            value_kind TEXT NOT NULL
        );

        CREATE INDEX idx_frontmatter_file ON frontmatter(file_id);
        CREATE INDEX idx_frontmatter_key ON frontmatter(key);

        -- Normalized tags with provenance
        CREATE TABLE tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'unknown',
            UNIQUE (file_id, tag)
        );

        CREATE INDEX idx_tags_file ON tags(file_id);
        CREATE INDEX idx_tags_tag ON tags(tag);

        -- Extracted links
        CREATE TABLE links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            link_text TEXT,
            target TEXT NOT NULL,
            link_kind TEXT NOT NULL,
            is_internal INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX idx_links_file ON links(file_id);
        CREATE INDEX idx_links_target ON links(target);

        -- Full-text search surface. Virtual tables cannot carry foreign
        -- keys, so orphan cleanup must sweep this table explicitly.
        CREATE VIRTUAL TABLE fulltext USING fts5(
            title,
            body,
            headings,
            file_id UNINDEXED
        );
        "#,
    )?;

    conn.execute(
        "INSERT INTO cache_metadata (key, value) VALUES ('last_updated', ?1)",
        [Utc::now().to_rfc3339()],
    )?;

    Ok(())
}

fn migrate(_conn: &Connection, from_version: i32) -> Result<(), SchemaError> {
    // Add migration steps here as the schema evolves
    Err(SchemaError::MigrationFailed(format!(
        "No migration path from version {} to {}",
        from_version, SCHEMA_VERSION
    )))
}
