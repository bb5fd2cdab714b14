//! Cache health and consistency: validity evaluation, targeted
//! invalidation, orphan cleanup, and directory synchronization.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

use super::builder::{Indexer, IndexerError};
use super::db::{StoreDb, StoreError};
use super::schema::{SCHEMA_VERSION, get_schema_version, structural_check};
use super::types::{CleanupStats, InvalidReason, SyncStats, ValidityReport};
use crate::config::IndexConfig;
use crate::vault::{VaultWalker, WalkerError, normalize_path};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scanner error: {0}")]
    Walker(#[from] WalkerError),

    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),
}

/// Manages the health of one derived store. Mutating operations are
/// serialized through the exclusive store borrow.
pub struct CacheManager<'a> {
    store: &'a mut StoreDb,
    config: &'a IndexConfig,
}

impl<'a> CacheManager<'a> {
    pub fn new(store: &'a mut StoreDb, config: &'a IndexConfig) -> Self {
        Self { store, config }
    }

    /// Open or create a store, creating the schema if absent.
    /// Idempotent on an existing, structurally valid store.
    pub fn initialize(db_path: &Path) -> Result<StoreDb, CacheError> {
        Ok(StoreDb::open(db_path)?)
    }

    /// Evaluate a store artifact on disk without opening it for writing
    /// (and without creating it when absent).
    pub fn probe(db_path: &Path, max_age_hours: u64) -> ValidityReport {
        if !db_path.exists() {
            return ValidityReport::invalid(InvalidReason::Missing);
        }

        let conn = match Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY,
        ) {
            Ok(conn) => conn,
            Err(e) => {
                return ValidityReport::invalid(InvalidReason::Unopenable(e.to_string()));
            }
        };

        Self::evaluate(&conn, max_age_hours)
    }

    /// Evaluate the open store: schema version, structural self-check,
    /// and the advisory staleness window.
    pub fn validity(&self) -> ValidityReport {
        Self::evaluate(self.store.connection(), self.config.max_cache_age_hours)
    }

    /// True only when the store opens, matches the expected schema,
    /// passes the structural check, and was updated within the validity
    /// window.
    pub fn is_valid(&self) -> bool {
        self.validity().valid
    }

    fn evaluate(conn: &Connection, max_age_hours: u64) -> ValidityReport {
        match get_schema_version(conn) {
            Ok(version) if version == SCHEMA_VERSION => {}
            Ok(version) => {
                return ValidityReport::invalid(InvalidReason::SchemaMismatch {
                    found: version.to_string(),
                    expected: SCHEMA_VERSION,
                });
            }
            Err(e) => {
                return ValidityReport::invalid(InvalidReason::Unopenable(e.to_string()));
            }
        }

        if let Err(e) = structural_check(conn) {
            return ValidityReport::invalid(InvalidReason::StructuralCheck(e.to_string()));
        }

        let last_updated: Option<String> = conn
            .query_row(
                "SELECT value FROM cache_metadata WHERE key = 'last_updated'",
                [],
                |row| row.get(0),
            )
            .ok();
        let last_updated = last_updated
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc));

        let age_hours = match last_updated {
            Some(stamp) => (Utc::now() - stamp).num_hours(),
            None => i64::MAX,
        };
        if age_hours > max_age_hours as i64 {
            return ValidityReport::invalid(InvalidReason::Stale { age_hours });
        }

        ValidityReport::ok()
    }

    /// Delete one file record and its derived rows. A path that was
    /// never indexed is a no-op, not an error.
    pub fn invalidate_file(&mut self, path: &Path) -> Result<bool, CacheError> {
        let normalized = normalize_path(path);
        Ok(self.store.remove_file(&normalized)?)
    }

    /// Delete every file record under a directory. Returns the count
    /// removed.
    pub fn invalidate_directory(&mut self, root: &Path) -> Result<usize, CacheError> {
        let normalized = normalize_path(root);
        let removed = self.store.remove_under(&normalized)?;
        tracing::debug!("invalidated {} records under {}", removed, normalized.display());
        Ok(removed)
    }

    /// Two-pass orphan cleanup: drop records whose path is gone from
    /// disk, then defensively sweep each derived table for rows whose
    /// file reference no longer resolves. Idempotent and safe to re-run
    /// after any aborted attempt.
    pub fn cleanup_orphaned_entries(&mut self) -> Result<CleanupStats, CacheError> {
        let mut stats = CleanupStats::default();

        for (_id, path) in self.store.list_files()? {
            stats.files_checked += 1;
            match std::fs::metadata(&path) {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if self.store.remove_file(&path)? {
                        stats.files_removed += 1;
                    }
                }
                Err(e) => {
                    // Unreachable paths are not treated as deleted
                    tracing::warn!("could not stat {}: {}", path.display(), e);
                }
            }
        }

        let (frontmatter, tags, links, fulltext) = self.store.sweep_dangling_rows()?;
        stats.orphaned_frontmatter = frontmatter;
        stats.orphaned_tags = tags;
        stats.orphaned_links = links;
        stats.orphaned_fulltext = fulltext;

        if stats.files_removed > 0 || stats.orphaned_rows() > 0 {
            tracing::info!(
                "cleanup removed {} records and {} orphaned rows",
                stats.files_removed,
                stats.orphaned_rows()
            );
        }
        Ok(stats)
    }

    /// Three-way diff between the on-disk file set and the recorded set
    /// for a root: disk-only paths are indexed as added, store-only
    /// paths are invalidated as removed, paths in both run through the
    /// change detector. A disk-scan miss is authoritative for this pass.
    pub fn sync_directory(
        &mut self,
        root: &Path,
        recursive: bool,
    ) -> Result<SyncStats, CacheError> {
        let start = std::time::Instant::now();
        let mut stats = SyncStats::default();

        let walker = VaultWalker::new(root, recursive, self.config)?;
        let disk: BTreeSet<PathBuf> =
            walker.walk()?.into_iter().map(|f| f.absolute_path).collect();
        // The stored set must cover exactly what the scan can see: a
        // non-recursive sync diffs direct children only, or every
        // subdirectory record would read as removed
        let stored: BTreeSet<PathBuf> = self
            .store
            .paths_under(walker.root())?
            .into_iter()
            .filter(|path| recursive || path.parent() == Some(walker.root()))
            .collect();

        for path in stored.difference(&disk) {
            if self.store.remove_file(path)? {
                stats.files_removed += 1;
            }
        }

        for path in &disk {
            if stored.contains(path) {
                match Indexer::new(self.store, self.config).index_candidate(path) {
                    Ok(true) => stats.files_updated += 1,
                    Ok(false) => stats.files_unchanged += 1,
                    Err(e) => {
                        tracing::warn!("Failed to sync {}: {}", path.display(), e);
                        stats.files_errored += 1;
                    }
                }
            } else {
                match Indexer::new(self.store, self.config).index_file(path) {
                    Ok(_) => stats.files_added += 1,
                    Err(e) => {
                        tracing::warn!("Failed to index {}: {}", path.display(), e);
                        stats.files_errored += 1;
                    }
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "sync of {}: {} added, {} updated, {} removed, {} unchanged, {} errored",
            root.display(),
            stats.files_added,
            stats.files_updated,
            stats.files_removed,
            stats.files_unchanged,
            stats.files_errored
        );
        Ok(stats)
    }

    /// Reclaim space after heavy churn. No behavior change for callers.
    pub fn vacuum(&mut self) -> Result<(), CacheError> {
        Ok(self.store.vacuum()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn indexed_vault() -> (TempDir, StoreDb, IndexConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(
            root.join("a.md"),
            "---\ntags: [alpha]\n---\n# A\n\nLinks to [[b]].\n",
        )
        .unwrap();
        fs::write(root.join("b.md"), "# B\n\nText with #beta.\n").unwrap();
        fs::write(root.join("c.md"), "# C\n\nPlain.\n").unwrap();

        let mut store = StoreDb::open_in_memory().unwrap();
        let config = IndexConfig::default();
        Indexer::new(&mut store, &config).index_directory(root, true).unwrap();

        (dir, store, config)
    }

    #[test]
    fn fresh_store_is_valid() {
        let (_dir, mut store, config) = indexed_vault();
        let cache = CacheManager::new(&mut store, &config);
        assert!(cache.is_valid());
    }

    #[test]
    fn missing_store_probe() {
        let report = CacheManager::probe(Path::new("/nonexistent/index.db"), 24);
        assert_eq!(report.reason, Some(InvalidReason::Missing));
    }

    #[test]
    fn probe_does_not_create_the_store() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("index.db");
        CacheManager::probe(&db_path, 24);
        assert!(!db_path.exists());
    }

    #[test]
    fn stale_store_is_invalid_with_reason() {
        let (_dir, mut store, config) = indexed_vault();

        let old = (Utc::now() - chrono::Duration::hours(48)).to_rfc3339();
        store
            .connection()
            .execute(
                "UPDATE cache_metadata SET value = ?1 WHERE key = 'last_updated'",
                [old],
            )
            .unwrap();

        let cache = CacheManager::new(&mut store, &config);
        let report = cache.validity();
        assert!(!report.valid);
        assert!(matches!(report.reason, Some(InvalidReason::Stale { age_hours }) if age_hours >= 48));
    }

    #[test]
    fn structural_damage_is_detected() {
        let (_dir, mut store, config) = indexed_vault();
        store.connection().execute_batch("DROP TABLE tags;").unwrap();

        let cache = CacheManager::new(&mut store, &config);
        let report = cache.validity();
        assert!(matches!(report.reason, Some(InvalidReason::StructuralCheck(_))));
    }

    #[test]
    fn invalidate_file_is_a_noop_for_unknown_paths() {
        let (_dir, mut store, config) = indexed_vault();
        let mut cache = CacheManager::new(&mut store, &config);

        assert!(!cache.invalidate_file(Path::new("/never/indexed.md")).unwrap());
    }

    #[test]
    fn invalidate_directory_counts_removals() {
        let (dir, mut store, config) = indexed_vault();
        let mut cache = CacheManager::new(&mut store, &config);

        let removed = cache.invalidate_directory(dir.path()).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(store.file_count().unwrap(), 0);
    }

    #[test]
    fn cleanup_removes_records_for_deleted_files() {
        let (dir, mut store, config) = indexed_vault();
        fs::remove_file(dir.path().join("b.md")).unwrap();

        let mut cache = CacheManager::new(&mut store, &config);
        let stats = cache.cleanup_orphaned_entries().unwrap();

        assert_eq!(stats.files_checked, 3);
        assert_eq!(stats.files_removed, 1);
        assert_eq!(store.file_count().unwrap(), 2);
        assert_eq!(store.dangling_row_counts().unwrap(), (0, 0, 0, 0));
    }

    #[test]
    fn cleanup_is_idempotent() {
        let (dir, mut store, config) = indexed_vault();
        fs::remove_file(dir.path().join("b.md")).unwrap();

        let mut cache = CacheManager::new(&mut store, &config);
        cache.cleanup_orphaned_entries().unwrap();
        let stats = cache.cleanup_orphaned_entries().unwrap();

        assert_eq!(stats.files_removed, 0);
        assert_eq!(stats.orphaned_rows(), 0);
    }

    #[test]
    fn sync_reports_three_way_diff() {
        let (dir, mut store, config) = indexed_vault();
        let root = dir.path();

        // Remove a, modify b, add d; c stays unchanged
        fs::remove_file(root.join("a.md")).unwrap();
        fs::write(root.join("b.md"), "# B\n\nNew content entirely.\n").unwrap();
        fs::write(root.join("d.md"), "# D\n\nFresh file.\n").unwrap();

        let mut cache = CacheManager::new(&mut store, &config);
        let stats = cache.sync_directory(root, true).unwrap();

        assert_eq!(stats.files_removed, 1);
        assert_eq!(stats.files_updated, 1);
        assert_eq!(stats.files_added, 1);
        assert_eq!(stats.files_unchanged, 1);
        assert_eq!(stats.files_errored, 0);
        assert_eq!(store.file_count().unwrap(), 3);
    }

    #[test]
    fn non_recursive_sync_leaves_subdirectory_records_alone() {
        let (dir, mut store, config) = indexed_vault();
        let root = dir.path();

        fs::create_dir(root.join("subdir")).unwrap();
        fs::write(root.join("subdir/nested.md"), "# Nested\n\nBody.\n").unwrap();
        Indexer::new(&mut store, &config).index_directory(root, true).unwrap();
        assert_eq!(store.file_count().unwrap(), 4);

        let mut cache = CacheManager::new(&mut store, &config);
        let stats = cache.sync_directory(root, false).unwrap();

        assert_eq!(stats.files_removed, 0);
        assert_eq!(stats.files_unchanged, 3);
        assert_eq!(store.file_count().unwrap(), 4);
        assert!(
            store
                .get_file(&normalize_path(&root.join("subdir/nested.md")))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn sync_on_unchanged_tree_touches_nothing() {
        let (dir, mut store, config) = indexed_vault();

        let mut cache = CacheManager::new(&mut store, &config);
        let stats = cache.sync_directory(dir.path(), true).unwrap();

        assert_eq!(stats.files_added, 0);
        assert_eq!(stats.files_updated, 0);
        assert_eq!(stats.files_removed, 0);
        assert_eq!(stats.files_unchanged, 3);
    }

    #[test]
    fn vacuum_preserves_validity() {
        let (_dir, mut store, config) = indexed_vault();
        let mut cache = CacheManager::new(&mut store, &config);

        cache.vacuum().unwrap();
        assert!(cache.is_valid());
    }
}
