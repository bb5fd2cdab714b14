//! Tag extraction from frontmatter and body text.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::sanitize::strip_code_blocks;
use crate::frontmatter::FieldValue;
use crate::index::types::{TagRow, TagSource};

/// Frontmatter keys whose values declare tags.
const TAG_KEYS: [&str; 3] = ["tags", "tag", "keywords"];

// Inline tags: leading # at a word boundary, restricted charset,
// hierarchy with / (underscore is an in-segment character)
static INLINE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(\[{])#([A-Za-z0-9_/-]+)").unwrap());

/// Extract tags from recognized frontmatter keys and inline `#tag`
/// tokens in the body. Duplicate (file, tag) pairs are dropped, first
/// provenance wins; frontmatter is processed before content.
pub fn extract_tags(fields: &BTreeMap<String, FieldValue>, body: &str) -> Vec<TagRow> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut tags = Vec::new();

    for candidate in frontmatter_candidates(fields) {
        if let Some(tag) = normalize_tag(&candidate)
            && seen.insert(tag.clone())
        {
            tags.push(TagRow { tag, source: TagSource::Frontmatter });
        }
    }

    let scannable = strip_code_blocks(body);
    for line in scannable.lines() {
        for cap in INLINE_TAG_RE.captures_iter(line) {
            if let Some(tag) = normalize_tag(&cap[1])
                && seen.insert(tag.clone())
            {
                tags.push(TagRow { tag, source: TagSource::Content });
            }
        }
    }

    tags
}

/// Collect raw tag candidates from frontmatter values: arrays contribute
/// one candidate per element, scalar strings are comma-split.
fn frontmatter_candidates(fields: &BTreeMap<String, FieldValue>) -> Vec<String> {
    let mut out = Vec::new();

    for (key, value) in fields {
        if !TAG_KEYS.contains(&key.to_lowercase().as_str()) {
            continue;
        }
        match value {
            FieldValue::Array(items) => {
                for item in items {
                    if let Some(s) = item.as_str() {
                        out.push(s.to_string());
                    }
                }
            }
            other => {
                if let Some(s) = other.as_str() {
                    out.extend(s.split(',').map(ToString::to_string));
                }
            }
        }
    }

    out
}

/// Normalize and validate a raw tag: lowercase, trimmed, no leading `#`.
/// Rejects tags shorter than 2 characters, tags starting with a digit,
/// purely numeric tags, and hierarchies with empty segments.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#').trim().to_lowercase();

    if tag.len() < 2 {
        return None;
    }
    if tag.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    if tag.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if tag.split('/').any(|segment| segment.is_empty()) {
        return None;
    }

    Some(tag)
}
