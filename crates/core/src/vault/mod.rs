//! Filesystem side of the engine: candidate discovery, content
//! fingerprinting, decoding, and change detection.

pub mod change;
pub mod hasher;
pub mod reader;
pub mod walker;

pub use change::{ChangeError, should_reindex};
pub use hasher::{fingerprint_bytes, fingerprint_file};
pub use reader::{ReadError, read_decoded};
pub use walker::{VaultWalker, WalkedFile, WalkerError};

use std::path::{Component, Path, PathBuf};

/// Normalize a path to its absolute form. Existing paths are
/// canonicalized; paths that no longer exist (records for deleted
/// files) are cleaned lexically so they still compare against stored
/// keys.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| lexical_absolute(path))
}

fn lexical_absolute(path: &Path) -> PathBuf {
    let mut abs = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir().unwrap_or_default()
    };
    for component in path.components() {
        match component {
            Component::ParentDir => {
                abs.pop();
            }
            Component::CurDir => {}
            other => abs.push(other),
        }
    }
    abs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_normalization_resolves_dots() {
        assert_eq!(
            normalize_path(Path::new("/gone/a/./b/../c.md")),
            PathBuf::from("/gone/a/c.md")
        );
    }

    #[test]
    fn existing_paths_are_canonicalized() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("note.md");
        std::fs::write(&file, "x").unwrap();

        let via_dots = dir.path().join(".").join("note.md");
        assert_eq!(normalize_path(&via_dots), file.canonicalize().unwrap());
    }
}
