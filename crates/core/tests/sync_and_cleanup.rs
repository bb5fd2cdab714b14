//! Cache consistency: orphan cleanup, directory sync, and validity of
//! on-disk stores.

use std::fs;

use mdindex_core::config::IndexConfig;
use mdindex_core::index::{CacheManager, Indexer, InvalidReason, StoreDb};
use mdindex_core::vault::normalize_path;
use tempfile::TempDir;

fn indexed_tree() -> (TempDir, StoreDb, IndexConfig) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(
        root.join("a.md"),
        "---\ntitle: Alpha\ntags: [first]\n---\n# Alpha\n\nSee [[b]].\n",
    )
    .unwrap();
    fs::write(root.join("b.md"), "# Beta\n\nTagged #second here.\n").unwrap();
    fs::write(root.join("c.md"), "# Gamma\n\nQuiet file.\n").unwrap();

    let mut store = StoreDb::open_in_memory().unwrap();
    let config = IndexConfig::default();
    Indexer::new(&mut store, &config).index_directory(root, true).unwrap();

    (dir, store, config)
}

#[test]
fn cleanup_after_deletion_restores_consistency() {
    let (dir, mut store, config) = indexed_tree();
    assert_eq!(store.file_count().unwrap(), 3);

    let removed_path = normalize_path(&dir.path().join("a.md"));
    let removed_id = store.get_file(&removed_path).unwrap().unwrap().id.unwrap();
    fs::remove_file(dir.path().join("a.md")).unwrap();

    let stats = CacheManager::new(&mut store, &config).cleanup_orphaned_entries().unwrap();

    assert_eq!(stats.files_checked, 3);
    assert_eq!(stats.files_removed, 1);
    assert_eq!(store.file_count().unwrap(), 2);
    assert_eq!(store.derived_row_counts(removed_id).unwrap(), (0, 0, 0, 0));
    assert_eq!(store.dangling_row_counts().unwrap(), (0, 0, 0, 0));
}

#[test]
fn sync_classifies_added_updated_removed_unchanged() {
    let (dir, mut store, config) = indexed_tree();
    let root = dir.path();

    fs::remove_file(root.join("a.md")).unwrap();
    fs::write(root.join("b.md"), "# Beta\n\nCompletely rewritten body.\n").unwrap();
    fs::write(root.join("d.md"), "# Delta\n\nBrand new.\n").unwrap();

    let stats =
        CacheManager::new(&mut store, &config).sync_directory(root, true).unwrap();

    assert_eq!(stats.files_removed, 1);
    assert_eq!(stats.files_updated, 1);
    assert_eq!(stats.files_added, 1);
    assert_eq!(stats.files_unchanged, 1);
    assert_eq!(stats.files_errored, 0);

    assert!(store.get_file(&normalize_path(&root.join("a.md"))).unwrap().is_none());
    assert!(store.get_file(&normalize_path(&root.join("d.md"))).unwrap().is_some());
    assert_eq!(store.dangling_row_counts().unwrap(), (0, 0, 0, 0));
}

#[test]
fn sync_is_idempotent_once_converged() {
    let (dir, mut store, config) = indexed_tree();
    fs::write(dir.path().join("d.md"), "# Delta\n").unwrap();

    CacheManager::new(&mut store, &config).sync_directory(dir.path(), true).unwrap();
    let stats =
        CacheManager::new(&mut store, &config).sync_directory(dir.path(), true).unwrap();

    assert_eq!(stats.files_added, 0);
    assert_eq!(stats.files_updated, 0);
    assert_eq!(stats.files_removed, 0);
    assert_eq!(stats.files_unchanged, 4);
}

#[test]
fn sync_scopes_to_the_given_root() {
    let (dir, mut store, config) = indexed_tree();
    let other = TempDir::new().unwrap();
    fs::write(other.path().join("elsewhere.md"), "# Elsewhere\n").unwrap();
    Indexer::new(&mut store, &config).index_directory(other.path(), true).unwrap();

    // Syncing the first tree must not touch records from the second
    fs::remove_file(dir.path().join("c.md")).unwrap();
    let stats =
        CacheManager::new(&mut store, &config).sync_directory(dir.path(), true).unwrap();

    assert_eq!(stats.files_removed, 1);
    assert!(
        store
            .get_file(&normalize_path(&other.path().join("elsewhere.md")))
            .unwrap()
            .is_some()
    );
}

#[test]
fn on_disk_store_round_trips_and_validates() {
    let tree = TempDir::new().unwrap();
    fs::write(tree.path().join("note.md"), "# Persisted\n\nContent.\n").unwrap();

    let store_dir = TempDir::new().unwrap();
    let db_path = store_dir.path().join("index.db");
    let config = IndexConfig { db_path: db_path.clone(), ..IndexConfig::default() };

    {
        let mut store = CacheManager::initialize(&db_path).unwrap();
        Indexer::new(&mut store, &config).index_directory(tree.path(), true).unwrap();
    }

    // Reopen: schema init is idempotent, data persisted
    let mut store = CacheManager::initialize(&db_path).unwrap();
    assert_eq!(store.file_count().unwrap(), 1);

    let cache = CacheManager::new(&mut store, &config);
    assert!(cache.is_valid());

    let report = CacheManager::probe(&db_path, config.max_cache_age_hours);
    assert!(report.valid, "probe failed: {:?}", report.reason);
}

#[test]
fn probe_reports_missing_store() {
    let dir = TempDir::new().unwrap();
    let report = CacheManager::probe(&dir.path().join("absent.db"), 24);
    assert_eq!(report.reason, Some(InvalidReason::Missing));
}

#[test]
fn invalidation_then_reindex_round_trip() {
    let (dir, mut store, config) = indexed_tree();

    let removed =
        CacheManager::new(&mut store, &config).invalidate_directory(dir.path()).unwrap();
    assert_eq!(removed, 3);
    assert_eq!(store.file_count().unwrap(), 0);

    let stats =
        Indexer::new(&mut store, &config).index_directory(dir.path(), true).unwrap();
    assert_eq!(stats.files_indexed, 3);

    CacheManager::new(&mut store, &config).vacuum().unwrap();
    assert_eq!(store.file_count().unwrap(), 3);
}
