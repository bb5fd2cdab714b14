//! Link extraction: inline, wikilink, reference, and autolink syntaxes.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::sanitize::strip_code_blocks;
use crate::index::types::{LinkKind, LinkRow};

// Matches [[target]] or [[target|alias]], target may carry #section
// or #^block-id suffixes
static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").unwrap());

static INLINE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\(([^)]*)\)").unwrap());

static REFERENCE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\[([^\]]*)\]").unwrap());

static AUTOLINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9+.-]*:[^>\s]+)>").unwrap());

static DEFINITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}\[([^\]]+)\]:\s*(\S+)").unwrap());

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").unwrap());

/// Extract all links from a body. Reference-style links are resolved
/// against the body's `[id]: target` definition list with
/// case-insensitive ids; unresolved references are plain text, not links.
pub fn extract_links(body: &str) -> Vec<LinkRow> {
    let scannable = strip_code_blocks(body);
    let definitions = collect_definitions(&scannable);
    let mut links = Vec::new();

    for line in scannable.lines() {
        if DEFINITION_RE.is_match(line) {
            continue;
        }

        // Wikilinks first, then masked so the bracket-based syntaxes
        // cannot re-match inside them; same for each later stage.
        let mut masked = line.to_string();

        for cap in WIKILINK_RE.captures_iter(line) {
            let target = cap[1].trim().to_string();
            let text = cap.get(2).map(|m| m.as_str().trim().to_string());
            links.push(LinkRow { text, target, kind: LinkKind::Wikilink, internal: true });
        }
        masked = mask_matches(&masked, &WIKILINK_RE);

        let snapshot = masked.clone();
        for cap in INLINE_LINK_RE.captures_iter(&snapshot) {
            let text = non_empty(cap[1].trim());
            let target = first_token(cap[2].trim());
            links.push(LinkRow {
                text,
                internal: is_internal(&target),
                target,
                kind: LinkKind::Markdown,
            });
        }
        masked = mask_matches(&masked, &INLINE_LINK_RE);

        let snapshot = masked.clone();
        for cap in REFERENCE_LINK_RE.captures_iter(&snapshot) {
            let text = cap[1].trim();
            let id = if cap[2].trim().is_empty() { text } else { cap[2].trim() };
            let Some(target) = definitions.get(&id.to_lowercase()) else {
                continue;
            };
            links.push(LinkRow {
                text: non_empty(text),
                internal: is_internal(target),
                target: target.clone(),
                kind: LinkKind::Reference,
            });
        }
        masked = mask_matches(&masked, &REFERENCE_LINK_RE);

        for cap in AUTOLINK_RE.captures_iter(&masked) {
            let target = cap[1].to_string();
            links.push(LinkRow {
                text: None,
                internal: is_internal(&target),
                target,
                kind: LinkKind::Autolink,
            });
        }
    }

    links
}

/// Classify a target: internal when it is a relative path, an anchor, or
/// empty; external when it is an absolute scheme URL.
fn is_internal(target: &str) -> bool {
    !SCHEME_RE.is_match(target)
}

fn collect_definitions(text: &str) -> HashMap<String, String> {
    let mut definitions = HashMap::new();
    for line in text.lines() {
        if let Some(cap) = DEFINITION_RE.captures(line) {
            definitions
                .entry(cap[1].trim().to_lowercase())
                .or_insert_with(|| cap[2].to_string());
        }
    }
    definitions
}

/// Blank out every match so later, looser patterns cannot overlap it.
fn mask_matches(line: &str, re: &Regex) -> String {
    let mut bytes = line.as_bytes().to_vec();
    for m in re.find_iter(line) {
        bytes[m.range()].fill(b' ');
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// Take the first whitespace token of a link target, dropping an
/// optional quoted title.
fn first_token(target: &str) -> String {
    target.split_whitespace().next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_links() {
        let links = extract_links("See [the docs](./guide.md) and [site](https://example.com).");

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].kind, LinkKind::Markdown);
        assert_eq!(links[0].target, "./guide.md");
        assert_eq!(links[0].text.as_deref(), Some("the docs"));
        assert!(links[0].internal);
        assert!(!links[1].internal);
    }

    #[test]
    fn wikilinks_with_aliases_and_anchors() {
        let links =
            extract_links("Go [[note]] or [[other|alias]] or [[deep#section]] or [[ref#^block1]].");

        assert_eq!(links.len(), 4);
        assert!(links.iter().all(|l| l.kind == LinkKind::Wikilink && l.internal));
        assert_eq!(links[0].target, "note");
        assert_eq!(links[1].text.as_deref(), Some("alias"));
        assert_eq!(links[2].target, "deep#section");
        assert_eq!(links[3].target, "ref#^block1");
    }

    #[test]
    fn reference_links_resolve_case_insensitively() {
        let body = "See [the manual][RFC] and [Widgets][].\n\n[rfc]: https://example.com/rfc\n[widgets]: ./widgets.md";
        let links = extract_links(body);

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].kind, LinkKind::Reference);
        assert_eq!(links[0].target, "https://example.com/rfc");
        assert!(!links[0].internal);
        assert_eq!(links[1].target, "./widgets.md");
        assert!(links[1].internal);
    }

    #[test]
    fn unresolved_reference_is_not_a_link() {
        let links = extract_links("this [looks][missing] like a reference");
        assert!(links.is_empty());
    }

    #[test]
    fn autolinks() {
        let links = extract_links("Visit <https://example.com/page> today.");

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, LinkKind::Autolink);
        assert_eq!(links[0].target, "https://example.com/page");
        assert!(!links[0].internal);
    }

    #[test]
    fn anchors_and_empty_targets_are_internal() {
        let links = extract_links("jump [down](#section) or [nowhere]()");

        assert_eq!(links.len(), 2);
        assert!(links[0].internal);
        assert_eq!(links[0].target, "#section");
        assert!(links[1].internal);
        assert_eq!(links[1].target, "");
    }

    #[test]
    fn image_targets_are_extracted() {
        let links = extract_links("![alt text](images/pic.png)");

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "images/pic.png");
        assert_eq!(links[0].text.as_deref(), Some("alt text"));
    }

    #[test]
    fn titles_are_dropped_from_targets() {
        let links = extract_links("[docs](./guide.md \"the guide\")");
        assert_eq!(links[0].target, "./guide.md");
    }

    #[test]
    fn wikilinks_are_not_double_counted() {
        let links = extract_links("only [[one]] link");
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn links_in_code_blocks_are_ignored() {
        let body = "```\n[not](a-link.md)\n```\n[real](link.md)";
        let links = extract_links(body);

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "link.md");
    }
}
