//! Whole-document parsing: the pipeline from raw text to derived records.

use std::collections::BTreeMap;

use super::headings::{Heading, extract_headings};
use super::links::extract_links;
use super::sanitize::sanitize_for_search;
use super::tags::extract_tags;
use crate::frontmatter::{self, FieldValue};
use crate::index::types::{LinkRow, TagRow};

/// Structured output of parsing one document. Pure data; no knowledge of
/// files or storage.
#[derive(Debug, Clone, Default)]
pub struct ParsedContent {
    /// Typed frontmatter fields.
    pub fields: BTreeMap<String, FieldValue>,
    /// Resolved title, if any.
    pub title: Option<String>,
    pub headings: Vec<Heading>,
    /// Whitespace-tokenized word count of the body.
    pub word_count: usize,
    /// Sanitized body text for the search surface.
    pub search_text: String,
    pub tags: Vec<TagRow>,
    pub links: Vec<LinkRow>,
}

/// Run the full parsing pipeline over raw document text.
pub fn parse_document(raw: &str) -> ParsedContent {
    let split = frontmatter::parse(raw);

    let headings = extract_headings(&split.body);
    let tags = extract_tags(&split.fields, &split.body);
    let links = extract_links(&split.body);
    let title = resolve_title(&split.fields, &headings);
    let word_count = split.body.split_whitespace().count();
    let search_text = sanitize_for_search(&split.body);

    ParsedContent {
        fields: split.fields,
        title,
        headings,
        word_count,
        search_text,
        tags,
        links,
    }
}

/// Title resolution: a frontmatter key literally named "title"
/// (case-insensitive) wins, then the first heading. Absent otherwise.
fn resolve_title(
    fields: &BTreeMap<String, FieldValue>,
    headings: &[Heading],
) -> Option<String> {
    for (key, value) in fields {
        if key.eq_ignore_ascii_case("title")
            && let Some(s) = value.as_str()
        {
            return Some(s.to_string());
        }
    }
    headings.first().map(|h| h.text.clone())
}
