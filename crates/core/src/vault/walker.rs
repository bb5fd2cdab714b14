//! Directory scanning for indexable files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use walkdir::WalkDir;

use crate::config::IndexConfig;

#[derive(Debug, Error)]
pub enum WalkerError {
    #[error("scan root does not exist: {0}")]
    MissingRoot(String),

    #[error("scan root is not a directory: {0}")]
    NotADirectory(String),

    #[error("failed to walk directory {0}: {1}")]
    WalkError(String, #[source] walkdir::Error),

    #[error("failed to read file metadata {0}: {1}")]
    MetadataError(String, #[source] std::io::Error),
}

/// Information about a discovered candidate file.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    /// Absolute path to the file.
    pub absolute_path: PathBuf,
    /// File modification time.
    pub modified: SystemTime,
    /// File size in bytes.
    pub size: u64,
}

/// Walker producing a deterministic list of files with a supported
/// extension under a root directory.
#[derive(Debug)]
pub struct VaultWalker {
    root: PathBuf,
    recursive: bool,
    extensions: Vec<String>,
    excluded_folders: Vec<PathBuf>,
}

impl VaultWalker {
    /// Create a new walker for the given root.
    ///
    /// The root must exist and be a directory; both failures are
    /// distinguishable so callers can fail fast.
    pub fn new(
        root: &Path,
        recursive: bool,
        config: &IndexConfig,
    ) -> Result<Self, WalkerError> {
        let meta = std::fs::metadata(root).map_err(|e| match e.kind() {
            ErrorKind::NotFound => WalkerError::MissingRoot(root.display().to_string()),
            _ => WalkerError::MetadataError(root.display().to_string(), e),
        })?;
        if !meta.is_dir() {
            return Err(WalkerError::NotADirectory(root.display().to_string()));
        }

        let root = root
            .canonicalize()
            .map_err(|e| WalkerError::MetadataError(root.display().to_string(), e))?;

        // Normalize exclusions to be relative to root
        let excluded_folders = config
            .excluded_folders
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.strip_prefix(&root).unwrap_or(p).to_path_buf()
                } else {
                    p.clone()
                }
            })
            .collect();

        Ok(Self { root, recursive, extensions: config.extensions.clone(), excluded_folders })
    }

    /// Walk the root and return all supported files, sorted by path and
    /// deduplicated.
    ///
    /// Unreadable subdirectories are skipped with a warning rather than
    /// aborting the scan.
    pub fn walk(&self) -> Result<Vec<WalkedFile>, WalkerError> {
        let mut files = Vec::new();

        let mut walker = WalkDir::new(&self.root).follow_links(false);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        for entry in walker.into_iter().filter_entry(|e| !self.is_excluded(e)) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let kind = e.io_error().map(std::io::Error::kind);
                    if matches!(kind, Some(ErrorKind::PermissionDenied | ErrorKind::NotFound)) {
                        tracing::warn!(
                            "skipping unreadable entry under {}: {}",
                            self.root.display(),
                            e
                        );
                        continue;
                    }
                    return Err(WalkerError::WalkError(self.root.display().to_string(), e));
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !self.has_supported_extension(path) {
                continue;
            }

            // A candidate can vanish or become unreadable between
            // enumeration and stat; that drops the file, not the scan
            let metadata = match path.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            files.push(WalkedFile {
                absolute_path: path.to_path_buf(),
                modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));
        files.dedup_by(|a, b| a.absolute_path == b.absolute_path);
        Ok(files)
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                let e = e.to_lowercase();
                self.extensions.iter().any(|s| *s == e)
            })
    }

    /// Check whether an entry should be excluded from the walk.
    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        // Never filter the root directory (depth 0)
        if entry.depth() == 0 {
            return false;
        }

        let name = entry.file_name().to_string_lossy();

        // Skip hidden files and directories
        if name.starts_with('.') {
            return true;
        }

        // Skip common non-document directories
        if matches!(name.as_ref(), "node_modules" | "target" | "__pycache__" | "venv") {
            return true;
        }

        if !self.excluded_folders.is_empty()
            && let Ok(relative) = entry.path().strip_prefix(&self.root)
        {
            for excluded in &self.excluded_folders {
                if relative.starts_with(excluded) {
                    return true;
                }
            }
        }

        false
    }

    /// Get the canonicalized scan root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
