//! Indexing orchestration: scanner, change detection, parsing pipeline,
//! and transactional storage, for single files and whole directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::db::{StoreDb, StoreError};
use super::types::{
    DerivedRows, FileRecord, FrontmatterRow, FulltextRow, IndexStats,
};
use crate::config::IndexConfig;
use crate::content::parse_document;
use crate::vault::{
    ChangeError, ReadError, VaultWalker, WalkerError, fingerprint_bytes,
    normalize_path, read_decoded, should_reindex,
};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("access denied: {path}: {source}")]
    AccessDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(PathBuf),

    #[error("failed to read metadata for {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File read error: {0}")]
    Read(#[from] ReadError),

    #[error("Scanner error: {0}")]
    Walker(#[from] WalkerError),

    #[error("Change detection error: {0}")]
    Change(#[from] ChangeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Orchestrates indexing against a single store. The store is a single
/// logical writer; callers serialize concurrent mutation externally.
pub struct Indexer<'a> {
    store: &'a mut StoreDb,
    config: &'a IndexConfig,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a mut StoreDb, config: &'a IndexConfig) -> Self {
        Self { store, config }
    }

    /// Parse one file and replace its record plus all derived rows in a
    /// single transaction. Returns the file id.
    ///
    /// Fails with a distinguishable error if the path does not exist, is
    /// not a regular file, has an unsupported extension, or cannot be
    /// decoded by any supported encoding.
    pub fn index_file(&mut self, path: &Path) -> Result<i64, IndexerError> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => IndexerError::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => {
                IndexerError::AccessDenied { path: path.to_path_buf(), source: e }
            }
            _ => IndexerError::Metadata { path: path.to_path_buf(), source: e },
        })?;

        if !metadata.is_file() {
            return Err(IndexerError::NotAFile(path.to_path_buf()));
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if !self.config.supports_extension(extension) {
            return Err(IndexerError::UnsupportedExtension(path.to_path_buf()));
        }

        let path = normalize_path(path);
        let (bytes, text) = read_decoded(&path)?;
        let doc = parse_document(&text);

        let modified: DateTime<Utc> = metadata
            .modified()
            .map_err(|e| IndexerError::Metadata { path: path.clone(), source: e })?
            .into();
        let created: Option<DateTime<Utc>> =
            metadata.created().ok().map(Into::into);

        let record = FileRecord {
            id: None,
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            modified,
            created,
            size_bytes: bytes.len() as u64,
            content_hash: fingerprint_bytes(&bytes),
            word_count: doc.word_count as u32,
            heading_count: doc.headings.len() as u32,
            indexed_at: Utc::now(),
            path,
        };

        let fulltext = self.config.fts_enabled.then(|| FulltextRow {
            title: doc.title.clone(),
            body: doc.search_text.clone(),
            headings: doc
                .headings
                .iter()
                .map(|h| h.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        });

        let derived = DerivedRows {
            frontmatter: doc
                .fields
                .iter()
                .map(|(key, value)| FrontmatterRow {
                    key: key.clone(),
                    value: value.storage_value(),
                    kind: value.kind().to_string(),
                })
                .collect(),
            tags: doc.tags,
            links: doc.links,
            fulltext,
        };

        let file_id = self.store.replace_file(&record, &derived)?;
        tracing::debug!("indexed {} ({} words)", record.path.display(), record.word_count);
        Ok(file_id)
    }

    /// Index every supported file under a root. Unchanged files are
    /// skipped via change detection; per-file failures are counted and
    /// logged without aborting the batch.
    pub fn index_directory(
        &mut self,
        root: &Path,
        recursive: bool,
    ) -> Result<IndexStats, IndexerError> {
        let start = std::time::Instant::now();
        let mut stats = IndexStats::default();

        let walker = VaultWalker::new(root, recursive, self.config)?;
        let files = walker.walk()?;
        stats.files_found = files.len();

        for file in &files {
            match self.index_candidate(&file.absolute_path) {
                Ok(indexed) => {
                    if indexed {
                        stats.files_indexed += 1;
                    } else {
                        stats.files_skipped += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to index {}: {}",
                        file.absolute_path.display(),
                        e
                    );
                    stats.files_errored += 1;
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "indexed {} under {}: {} updated, {} skipped, {} errored",
            stats.files_found,
            root.display(),
            stats.files_indexed,
            stats.files_skipped,
            stats.files_errored
        );
        Ok(stats)
    }

    /// Drop every record under the root, then index it from scratch.
    pub fn rebuild_index(&mut self, root: &Path) -> Result<IndexStats, IndexerError> {
        let normalized = normalize_path(root);
        let removed = self.store.remove_under(&normalized)?;
        tracing::debug!("rebuild dropped {} records under {}", removed, normalized.display());

        self.index_directory(root, true)
    }

    /// Delete the record and derived rows for exactly this path.
    /// Reports whether anything was removed.
    pub fn remove_file(&mut self, path: &Path) -> Result<bool, IndexerError> {
        let normalized = normalize_path(path);
        Ok(self.store.remove_file(&normalized)?)
    }

    /// Index one candidate if the change detector requires it.
    /// Returns true when the file was (re)indexed, false when skipped.
    pub(crate) fn index_candidate(&mut self, path: &Path) -> Result<bool, IndexerError> {
        let normalized = normalize_path(path);
        let stored = self.store.get_file(&normalized)?;

        if !should_reindex(&normalized, stored.as_ref())? {
            return Ok(false);
        }

        self.index_file(&normalized)?;
        Ok(true)
    }
}
