//! Derived-store data types and operation statistics.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a tag was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Frontmatter,
    Content,
    #[default]
    Unknown,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontmatter => "frontmatter",
            Self::Content => "content",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "frontmatter" => Self::Frontmatter,
            "content" => Self::Content,
            _ => Self::Unknown,
        }
    }
}

/// Syntax a link was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Inline link: `[text](target)`
    Markdown,
    /// Wikilink: `[[target]]` or `[[target|alias]]`
    Wikilink,
    /// Reference link: `[text][id]` resolved against `[id]: target`
    Reference,
    /// Angle-bracket autolink: `<scheme://target>`
    Autolink,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Wikilink => "wikilink",
            Self::Reference => "reference",
            Self::Autolink => "autolink",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "markdown" => Some(Self::Markdown),
            "wikilink" => Some(Self::Wikilink),
            "reference" => Some(Self::Reference),
            "autolink" => Some(Self::Autolink),
            _ => None,
        }
    }
}

/// One indexed file. The absolute path is the stable join key for every
/// derived table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Database ID (None if not yet inserted).
    pub id: Option<i64>,
    /// Absolute, normalized path.
    pub path: PathBuf,
    /// File name component.
    pub file_name: String,
    /// Parent directory.
    pub directory: PathBuf,
    /// Filesystem modification time.
    pub modified: DateTime<Utc>,
    /// Filesystem creation time, where the platform reports one.
    pub created: Option<DateTime<Utc>>,
    /// File size in bytes.
    pub size_bytes: u64,
    /// SHA-256 of the file's byte content.
    pub content_hash: String,
    /// Whitespace-tokenized word count of the body.
    pub word_count: u32,
    /// Number of detected headings.
    pub heading_count: u32,
    /// When this record was last written.
    pub indexed_at: DateTime<Utc>,
}

/// One frontmatter key/value pair, stringified, with its inferred kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontmatterRow {
    pub key: String,
    pub value: String,
    pub kind: String,
}

/// One normalized tag with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRow {
    pub tag: String,
    pub source: TagSource,
}

/// One extracted link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRow {
    /// Display text (alias for wikilinks, text for markdown/reference links).
    pub text: Option<String>,
    /// Raw target as written.
    pub target: String,
    pub kind: LinkKind,
    /// Relative path, anchor, or wikilink target; false for absolute
    /// scheme URLs.
    pub internal: bool,
}

/// Searchable surface for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulltextRow {
    pub title: Option<String>,
    pub body: String,
    pub headings: String,
}

/// The full derived-row set replacing a file's previous rows.
#[derive(Debug, Clone, Default)]
pub struct DerivedRows {
    pub frontmatter: Vec<FrontmatterRow>,
    pub tags: Vec<TagRow>,
    pub links: Vec<LinkRow>,
    pub fulltext: Option<FulltextRow>,
}

/// Counts from a directory indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    /// Candidate files discovered by the scanner.
    pub files_found: usize,
    /// Files parsed and written.
    pub files_indexed: usize,
    /// Files skipped as unchanged.
    pub files_skipped: usize,
    /// Files that failed; the batch continued past them.
    pub files_errored: usize,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
}

/// Counts from a directory synchronization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    pub files_added: usize,
    pub files_updated: usize,
    pub files_removed: usize,
    pub files_unchanged: usize,
    pub files_errored: usize,
    pub duration_ms: u64,
}

/// Counts from an orphan cleanup pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupStats {
    /// Records whose path was checked on disk.
    pub files_checked: usize,
    /// Records removed because the path is gone.
    pub files_removed: usize,
    pub orphaned_frontmatter: usize,
    pub orphaned_tags: usize,
    pub orphaned_links: usize,
    pub orphaned_fulltext: usize,
}

impl CleanupStats {
    /// Total orphaned derived rows removed across all tables.
    pub fn orphaned_rows(&self) -> usize {
        self.orphaned_frontmatter
            + self.orphaned_tags
            + self.orphaned_links
            + self.orphaned_fulltext
    }
}

/// Why a store failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InvalidReason {
    /// The store file does not exist.
    Missing,
    /// The store file exists but could not be opened.
    Unopenable(String),
    /// The stored schema version does not match the supported version.
    SchemaMismatch { found: String, expected: i32 },
    /// A required table is absent or unqueryable.
    StructuralCheck(String),
    /// The last successful update is older than the validity window.
    Stale { age_hours: i64 },
}

/// Outcome of a cache validity evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidityReport {
    pub valid: bool,
    pub reason: Option<InvalidReason>,
}

impl ValidityReport {
    pub fn ok() -> Self {
        Self { valid: true, reason: None }
    }

    pub fn invalid(reason: InvalidReason) -> Self {
        Self { valid: false, reason: Some(reason) }
    }
}

/// One full-text search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub file_id: i64,
    pub path: PathBuf,
    pub title: Option<String>,
    /// BM25 rank; lower is better, as reported by the storage layer.
    pub score: f64,
}
