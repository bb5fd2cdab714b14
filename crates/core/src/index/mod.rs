//! Derived store and the operations that keep it faithful to disk.
//!
//! This module owns the SQLite schema, the transactional replace-on-write
//! of a file's derived rows, the indexing orchestration, and the cache
//! validity/invalidation/cleanup/sync machinery.
//!
//! # Example
//!
//! ```no_run
//! use mdindex_core::config::IndexConfig;
//! use mdindex_core::index::{Indexer, StoreDb};
//! use std::path::Path;
//!
//! let config = IndexConfig::default();
//! let mut store = StoreDb::open(&config.db_path).unwrap();
//! let stats = Indexer::new(&mut store, &config)
//!     .index_directory(Path::new("notes/"), true)
//!     .unwrap();
//! println!("{} indexed, {} skipped", stats.files_indexed, stats.files_skipped);
//! ```

pub mod builder;
pub mod cache;
pub mod db;
pub mod schema;
pub mod types;

pub use builder::{Indexer, IndexerError};
pub use cache::{CacheError, CacheManager};
pub use db::{StoreDb, StoreError};
pub use schema::{REQUIRED_TABLES, SCHEMA_VERSION, SchemaError};
pub use types::{
    CleanupStats, DerivedRows, FileRecord, FrontmatterRow, FulltextRow, IndexStats,
    InvalidReason, LinkKind, LinkRow, SearchHit, SyncStats, TagRow, TagSource,
    ValidityReport,
};
