//! Incremental markdown indexing and cache-consistency engine.
//!
//! Indexes a directory tree of markdown-like files into a queryable
//! derived store (metadata, frontmatter, tags, links, full text) and
//! keeps that store faithful to the filesystem as files are added,
//! edited, or removed, without requiring full rebuilds.

pub mod config;
pub mod content;
pub mod frontmatter;
pub mod index;
pub mod vault;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
