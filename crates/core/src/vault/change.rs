//! Change detection against stored file records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::hasher::fingerprint_file;
use crate::index::types::FileRecord;

#[derive(Debug, Error)]
pub enum ChangeError {
    #[error("failed to read metadata for {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fingerprint {path}: {source}")]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decide whether a file needs re-indexing.
///
/// Two-tier check: a newer filesystem mtime triggers re-indexing without
/// hashing; an unchanged mtime falls through to a fingerprint comparison,
/// which catches content changes that preserve the timestamp (restored
/// backups, clock skew, mtime-preserving copies).
///
/// Unreadable files are hard errors; the caller decides whether to
/// skip-and-count or abort.
pub fn should_reindex(
    path: &Path,
    stored: Option<&FileRecord>,
) -> Result<bool, ChangeError> {
    let stored = match stored {
        Some(record) => record,
        None => return Ok(true),
    };

    let metadata = std::fs::metadata(path)
        .map_err(|e| ChangeError::Metadata { path: path.to_path_buf(), source: e })?;
    let modified: DateTime<Utc> = metadata
        .modified()
        .map_err(|e| ChangeError::Metadata { path: path.to_path_buf(), source: e })?
        .into();

    if modified > stored.modified {
        return Ok(true);
    }

    let fingerprint = fingerprint_file(path)
        .map_err(|e| ChangeError::Fingerprint { path: path.to_path_buf(), source: e })?;

    Ok(fingerprint != stored.content_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::hasher::fingerprint_bytes;
    use std::fs;
    use tempfile::TempDir;

    fn record_for(path: &Path, content: &[u8]) -> FileRecord {
        let metadata = fs::metadata(path).unwrap();
        FileRecord {
            id: Some(1),
            path: path.to_path_buf(),
            file_name: path.file_name().unwrap().to_string_lossy().to_string(),
            directory: path.parent().unwrap().to_path_buf(),
            modified: metadata.modified().unwrap().into(),
            created: None,
            size_bytes: metadata.len(),
            content_hash: fingerprint_bytes(content),
            word_count: 0,
            heading_count: 0,
            indexed_at: Utc::now(),
        }
    }

    #[test]
    fn missing_record_requires_indexing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "# Note").unwrap();

        assert!(should_reindex(&path, None).unwrap());
    }

    #[test]
    fn unchanged_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "# Note").unwrap();

        let record = record_for(&path, b"# Note");
        assert!(!should_reindex(&path, Some(&record)).unwrap());
    }

    #[test]
    fn newer_mtime_triggers_reindex() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "# Note").unwrap();

        let mut record = record_for(&path, b"# Note");
        record.modified = record.modified - chrono::Duration::seconds(60);

        assert!(should_reindex(&path, Some(&record)).unwrap());
    }

    #[test]
    fn changed_content_with_stale_mtime_triggers_reindex() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "# Changed").unwrap();

        // Stored record claims a future mtime but a different hash, as
        // after an mtime-preserving restore of different content.
        let mut record = record_for(&path, b"# Original");
        record.modified = record.modified + chrono::Duration::seconds(60);

        assert!(should_reindex(&path, Some(&record)).unwrap());
    }

    #[test]
    fn unreadable_file_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.md");
        fs::write(&path, "# Note").unwrap();
        let record = record_for(&path, b"# Note");
        fs::remove_file(&path).unwrap();

        assert!(should_reindex(&path, Some(&record)).is_err());
    }
}
