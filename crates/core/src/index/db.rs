//! Derived store: connection handling and transactional row operations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use thiserror::Error;

use super::schema::{SchemaError, init_schema};
use super::types::{DerivedRows, FileRecord, LinkKind, SearchHit, TagSource};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Connection {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create store directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Handle to the derived store. A single logical writer: all mutating
/// operations take `&mut self` and run inside one transaction each, so
/// readers never observe a half-replaced derived-row set.
pub struct StoreDb {
    conn: Connection,
}

impl StoreDb {
    /// Open or create a store at the given path, creating the schema if
    /// absent. Idempotent on an existing, structurally valid store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::CreateDir {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Connection {
            path: path.display().to_string(),
            source: e,
        })?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Create an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get the underlying connection (read-only use).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ─────────────────────────────────────────────────────────────────────────
    // File records and derived rows
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace a file's record and all its derived rows in one
    /// transaction: delete all derived rows, then insert fresh ones.
    /// Returns the file id.
    pub fn replace_file(
        &mut self,
        record: &FileRecord,
        derived: &DerivedRows,
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO files (path, file_name, directory, modified_at, created_at,
                                size_bytes, content_hash, word_count, heading_count, indexed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(path) DO UPDATE SET
                file_name = excluded.file_name,
                directory = excluded.directory,
                modified_at = excluded.modified_at,
                created_at = excluded.created_at,
                size_bytes = excluded.size_bytes,
                content_hash = excluded.content_hash,
                word_count = excluded.word_count,
                heading_count = excluded.heading_count,
                indexed_at = excluded.indexed_at",
            params![
                record.path.to_string_lossy(),
                record.file_name,
                record.directory.to_string_lossy(),
                record.modified.to_rfc3339(),
                record.created.map(|d| d.to_rfc3339()),
                record.size_bytes as i64,
                record.content_hash,
                record.word_count,
                record.heading_count,
                record.indexed_at.to_rfc3339(),
            ],
        )?;

        let file_id: i64 = tx.query_row(
            "SELECT id FROM files WHERE path = ?1",
            [record.path.to_string_lossy()],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM frontmatter WHERE file_id = ?1", [file_id])?;
        tx.execute("DELETE FROM tags WHERE file_id = ?1", [file_id])?;
        tx.execute("DELETE FROM links WHERE file_id = ?1", [file_id])?;
        tx.execute("DELETE FROM fulltext WHERE file_id = ?1", [file_id])?;

        for row in &derived.frontmatter {
            tx.execute(
                "INSERT INTO frontmatter (file_id, key, value, value_kind)
                 VALUES (?1, ?2, ?3, ?4)",
                params![file_id, row.key, row.value, row.kind],
            )?;
        }
        for row in &derived.tags {
            tx.execute(
                "INSERT OR IGNORE INTO tags (file_id, tag, source) VALUES (?1, ?2, ?3)",
                params![file_id, row.tag, row.source.as_str()],
            )?;
        }
        for row in &derived.links {
            tx.execute(
                "INSERT INTO links (file_id, link_text, target, link_kind, is_internal)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![file_id, row.text, row.target, row.kind.as_str(), row.internal],
            )?;
        }
        if let Some(ft) = &derived.fulltext {
            tx.execute(
                "INSERT INTO fulltext (file_id, title, body, headings)
                 VALUES (?1, ?2, ?3, ?4)",
                params![file_id, ft.title, ft.body, ft.headings],
            )?;
        }

        Self::touch_last_updated(&tx)?;
        tx.commit()?;
        Ok(file_id)
    }

    /// Get a file record by its normalized path.
    pub fn get_file(&self, path: &Path) -> Result<Option<FileRecord>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, path, file_name, directory, modified_at, created_at,
                        size_bytes, content_hash, word_count, heading_count, indexed_at
                 FROM files WHERE path = ?1",
                [path.to_string_lossy()],
                Self::row_to_record,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Delete one file record and its derived rows. Returns whether
    /// anything was removed.
    pub fn remove_file(&mut self, path: &Path) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;

        let file_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM files WHERE path = ?1",
                [path.to_string_lossy()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(file_id) = file_id else {
            return Ok(false);
        };

        tx.execute("DELETE FROM fulltext WHERE file_id = ?1", [file_id])?;
        tx.execute("DELETE FROM files WHERE id = ?1", [file_id])?;
        Self::touch_last_updated(&tx)?;
        tx.commit()?;
        Ok(true)
    }

    /// Delete every file record whose path falls under the given
    /// directory. Returns the count removed.
    pub fn remove_under(&mut self, root: &Path) -> Result<usize, StoreError> {
        let pattern = like_prefix(root);
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM fulltext WHERE file_id IN
                (SELECT id FROM files WHERE path LIKE ?1 ESCAPE '\\')",
            [&pattern],
        )?;
        let removed = tx.execute(
            "DELETE FROM files WHERE path LIKE ?1 ESCAPE '\\'",
            [&pattern],
        )?;

        if removed > 0 {
            Self::touch_last_updated(&tx)?;
        }
        tx.commit()?;
        Ok(removed)
    }

    /// All known (id, path) pairs, sorted by path.
    pub fn list_files(&self) -> Result<Vec<(i64, PathBuf)>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, path FROM files ORDER BY path")?;
        let rows = stmt
            .query_map([], |row| {
                let id: i64 = row.get(0)?;
                let path: String = row.get(1)?;
                Ok((id, PathBuf::from(path)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Paths recorded under a directory, sorted.
    pub fn paths_under(&self, root: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT path FROM files WHERE path LIKE ?1 ESCAPE '\\' ORDER BY path",
        )?;
        let rows = stmt
            .query_map([like_prefix(root)], |row| {
                let path: String = row.get(0)?;
                Ok(PathBuf::from(path))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total file record count.
    pub fn file_count(&self) -> Result<i64, StoreError> {
        let count: i64 =
            self.conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Per-table derived row counts for one file:
    /// (frontmatter, tags, links, fulltext).
    pub fn derived_row_counts(
        &self,
        file_id: i64,
    ) -> Result<(i64, i64, i64, i64), StoreError> {
        let count = |sql: &str| -> Result<i64, rusqlite::Error> {
            self.conn.query_row(sql, [file_id], |row| row.get(0))
        };
        Ok((
            count("SELECT COUNT(*) FROM frontmatter WHERE file_id = ?1")?,
            count("SELECT COUNT(*) FROM tags WHERE file_id = ?1")?,
            count("SELECT COUNT(*) FROM links WHERE file_id = ?1")?,
            count("SELECT COUNT(*) FROM fulltext WHERE file_id = ?1")?,
        ))
    }

    /// Count of derived rows whose file reference does not resolve, per
    /// table. Zero everywhere after any successful operation.
    pub fn dangling_row_counts(&self) -> Result<(i64, i64, i64, i64), StoreError> {
        let count = |table: &str| -> Result<i64, rusqlite::Error> {
            self.conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {table}
                     WHERE file_id NOT IN (SELECT id FROM files)"
                ),
                [],
                |row| row.get(0),
            )
        };
        Ok((count("frontmatter")?, count("tags")?, count("links")?, count("fulltext")?))
    }

    /// Delete derived rows whose file reference no longer resolves.
    /// Returns per-table removal counts
    /// (frontmatter, tags, links, fulltext).
    pub fn sweep_dangling_rows(&mut self) -> Result<(usize, usize, usize, usize), StoreError> {
        let tx = self.conn.transaction()?;
        let sweep = |tx: &Transaction, table: &str| -> Result<usize, rusqlite::Error> {
            tx.execute(
                &format!(
                    "DELETE FROM {table}
                     WHERE file_id NOT IN (SELECT id FROM files)"
                ),
                [],
            )
        };
        let counts = (
            sweep(&tx, "frontmatter")?,
            sweep(&tx, "tags")?,
            sweep(&tx, "links")?,
            sweep(&tx, "fulltext")?,
        );
        tx.commit()?;
        Ok(counts)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived-row reads (for the query layer and tests)
    // ─────────────────────────────────────────────────────────────────────────

    /// Frontmatter rows for a file as (key, value, kind) triples.
    pub fn frontmatter_for(
        &self,
        file_id: i64,
    ) -> Result<Vec<(String, String, String)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value, value_kind FROM frontmatter WHERE file_id = ?1 ORDER BY key",
        )?;
        let rows = stmt
            .query_map([file_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Tag rows for a file as (tag, source) pairs.
    pub fn tags_for(&self, file_id: i64) -> Result<Vec<(String, TagSource)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT tag, source FROM tags WHERE file_id = ?1 ORDER BY tag",
        )?;
        let rows = stmt
            .query_map([file_id], |row| {
                let tag: String = row.get(0)?;
                let source: String = row.get(1)?;
                Ok((tag, TagSource::parse(&source)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Link rows for a file as (target, kind, internal) triples.
    pub fn links_for(
        &self,
        file_id: i64,
    ) -> Result<Vec<(String, LinkKind, bool)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT target, link_kind, is_internal FROM links WHERE file_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([file_id], |row| {
                let target: String = row.get(0)?;
                let kind: String = row.get(1)?;
                let internal: bool = row.get(2)?;
                Ok((target, LinkKind::parse(&kind).unwrap_or(LinkKind::Markdown), internal))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Full-text search over title, body, and heading text.
    pub fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT ft.file_id, f.path, ft.title, bm25(fulltext)
             FROM fulltext ft
             JOIN files f ON f.id = ft.file_id
             WHERE fulltext MATCH ?1
             ORDER BY bm25(fulltext)
             LIMIT ?2",
        )?;
        let hits = stmt
            .query_map(params![query, limit], |row| {
                let path: String = row.get(1)?;
                Ok(SearchHit {
                    file_id: row.get(0)?,
                    path: PathBuf::from(path),
                    title: row.get(2)?,
                    score: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cache metadata
    // ─────────────────────────────────────────────────────────────────────────

    /// Read a metadata value.
    pub fn metadata(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.conn
            .query_row(
                "SELECT value FROM cache_metadata WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Timestamp of the last successful write batch.
    pub fn last_updated(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let raw = self.metadata("last_updated")?;
        Ok(raw.and_then(|s| {
            DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))
        }))
    }

    /// Advance the last-updated timestamp inside a write transaction.
    /// Monotonic: never moves backwards even under clock skew.
    fn touch_last_updated(tx: &Transaction) -> Result<(), rusqlite::Error> {
        let prev: Option<String> = tx
            .query_row(
                "SELECT value FROM cache_metadata WHERE key = 'last_updated'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let prev = prev
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc));

        let now = Utc::now();
        let stamp = match prev {
            Some(prev) if prev >= now => prev + chrono::Duration::microseconds(1),
            _ => now,
        };

        tx.execute(
            "INSERT OR REPLACE INTO cache_metadata (key, value) VALUES ('last_updated', ?1)",
            [stamp.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Reclaim space after heavy churn. The store stays valid and
    /// queryable afterward.
    pub fn vacuum(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<FileRecord, rusqlite::Error> {
        let path: String = row.get(1)?;
        let directory: String = row.get(3)?;
        let modified: String = row.get(4)?;
        let created: Option<String> = row.get(5)?;
        let size: i64 = row.get(6)?;
        let indexed_at: String = row.get(10)?;

        Ok(FileRecord {
            id: Some(row.get(0)?),
            path: PathBuf::from(path),
            file_name: row.get(2)?,
            directory: PathBuf::from(directory),
            modified: parse_rfc3339(&modified, 4)?,
            created: created.as_deref().and_then(|s| {
                DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
            }),
            size_bytes: size as u64,
            content_hash: row.get(7)?,
            word_count: row.get(8)?,
            heading_count: row.get(9)?,
            indexed_at: parse_rfc3339(&indexed_at, 10)?,
        })
    }
}

fn parse_rfc3339(s: &str, column: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

/// SQL LIKE pattern matching every path under a directory, with the
/// wildcard characters escaped.
fn like_prefix(root: &Path) -> String {
    let mut prefix = root.to_string_lossy().into_owned();
    prefix = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    if !prefix.ends_with(std::path::MAIN_SEPARATOR) {
        prefix.push(std::path::MAIN_SEPARATOR);
    }
    prefix.push('%');
    prefix
}
