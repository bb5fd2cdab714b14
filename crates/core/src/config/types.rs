use std::path::PathBuf;

use serde::Deserialize;

/// Raw configuration file as written on disk.
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    #[serde(default)]
    pub index: IndexSection,
}

/// `[index]` section of the config file. All fields are optional and
/// fall back to the built-in defaults.
#[derive(Debug, Deserialize, Default)]
pub struct IndexSection {
    pub db_path: Option<String>,
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    pub max_cache_age_hours: Option<u64>,
    pub fts_enabled: Option<bool>,
}

/// Resolved configuration consulted by the indexing engine.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Location of the SQLite store artifact.
    pub db_path: PathBuf,
    /// Supported file extensions, lowercase, without the leading dot.
    pub extensions: Vec<String>,
    /// Folders the scanner must not descend into (relative to the
    /// scanned root, or absolute).
    pub excluded_folders: Vec<PathBuf>,
    /// Advisory cache validity window in hours.
    pub max_cache_age_hours: u64,
    /// Whether full-text rows are written alongside the other derived rows.
    pub fts_enabled: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_path: super::loader::default_db_path(),
            extensions: default_extensions(),
            excluded_folders: Vec::new(),
            max_cache_age_hours: 24,
            fts_enabled: true,
        }
    }
}

impl IndexConfig {
    /// Check whether an extension (without the dot) is in the supported set.
    pub fn supports_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }
}

pub(crate) fn default_extensions() -> Vec<String> {
    ["md", "markdown", "mdx", "mdown", "mkd"].iter().map(ToString::to_string).collect()
}
