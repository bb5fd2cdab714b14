//! Body sanitization for the full-text search surface.

use std::sync::LazyLock;

use regex::Regex;

static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

static INLINE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").unwrap());

static WIKILINK_ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[[^\]|]+\|([^\]]+)\]\]").unwrap());

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());

static REFERENCE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\[[^\]]*\]").unwrap());

static AUTOLINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9+.-]*:[^>\s]+)>").unwrap());

static INLINE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]*)`").unwrap());

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*|__([^_]+)__").unwrap());

static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*|\b_([^_]+)_\b").unwrap());

static STRIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~~([^~]+)~~").unwrap());

static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d{1,9}[.)])\s+").unwrap());

static ATX_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#{1,6}\s+").unwrap());

static REF_DEFINITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}\[[^\]]+\]:\s*\S+").unwrap());

/// Produce the sanitized searchable text for a body: typography
/// normalized, code blocks dropped, markup tokens stripped with their
/// textual content retained.
pub fn sanitize_for_search(body: &str) -> String {
    let text = normalize_typography(body);
    let text = strip_code_blocks(&text);

    let mut lines = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if is_underline_or_rule(trimmed) || REF_DEFINITION_RE.is_match(line) {
            continue;
        }
        lines.push(strip_line_markers(line));
    }
    let text = lines.join("\n");

    let text = IMAGE_RE.replace_all(&text, "$1");
    let text = INLINE_LINK_RE.replace_all(&text, "$1");
    let text = WIKILINK_ALIAS_RE.replace_all(&text, "$1");
    let text = WIKILINK_RE.replace_all(&text, "$1");
    let text = REFERENCE_LINK_RE.replace_all(&text, "$1");
    let text = AUTOLINK_RE.replace_all(&text, "$1");
    let text = INLINE_CODE_RE.replace_all(&text, "$1");
    let text = BOLD_RE.replace_all(&text, "$1$2");
    let text = EMPHASIS_RE.replace_all(&text, "$1$2");
    let text = STRIKE_RE.replace_all(&text, "$1");

    text.trim().to_string()
}

/// Normalize smart quotes, dashes, and ellipses to their ASCII forms.
pub fn normalize_typography(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{2032}' => out.push('\''),
            '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2015}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00a0}' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Remove fenced and indented code blocks entirely.
pub fn strip_code_blocks(text: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if line.starts_with("    ") || line.starts_with('\t') {
            continue;
        }
        out.push(line);
    }

    out.join("\n")
}

fn strip_line_markers(line: &str) -> String {
    let mut rest = line.trim_start();
    // Blockquote markers may nest
    while let Some(stripped) = rest.strip_prefix('>') {
        rest = stripped.trim_start();
    }
    let rest = ATX_MARKER_RE.replace(rest, "");
    LIST_MARKER_RE.replace(&rest, "").into_owned()
}

fn is_underline_or_rule(trimmed: &str) -> bool {
    !trimmed.is_empty()
        && (trimmed.chars().all(|c| c == '=')
            || (trimmed.len() >= 2 && trimmed.chars().all(|c| c == '-')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typography_is_normalized() {
        assert_eq!(
            normalize_typography("\u{201c}it\u{2019}s\u{201d} \u{2014} fine\u{2026}"),
            "\"it's\" - fine..."
        );
    }

    #[test]
    fn fenced_code_is_removed() {
        let body = "keep\n```rust\nfn gone() {}\n```\nalso keep";
        assert_eq!(strip_code_blocks(body), "keep\nalso keep");
    }

    #[test]
    fn indented_code_is_removed() {
        let body = "keep\n    let gone = 1;\nkeep too";
        assert_eq!(strip_code_blocks(body), "keep\nkeep too");
    }

    #[test]
    fn link_text_is_retained() {
        let out = sanitize_for_search("See [the docs](https://example.com) here.");
        assert_eq!(out, "See the docs here.");
    }

    #[test]
    fn image_alt_is_retained() {
        let out = sanitize_for_search("![diagram](pic.png) caption");
        assert_eq!(out, "diagram caption");
    }

    #[test]
    fn wikilink_alias_wins() {
        assert_eq!(sanitize_for_search("go [[target|there]] now"), "go there now");
        assert_eq!(sanitize_for_search("go [[target]] now"), "go target now");
    }

    #[test]
    fn inline_code_keeps_content() {
        assert_eq!(sanitize_for_search("run `cargo test` locally"), "run cargo test locally");
    }

    #[test]
    fn emphasis_markers_are_stripped() {
        assert_eq!(sanitize_for_search("**bold** and *em* and ~~gone~~"), "bold and em and gone");
    }

    #[test]
    fn block_markers_are_stripped() {
        let body = "# Title\n> quoted text\n- item one\n2. item two";
        assert_eq!(sanitize_for_search(body), "Title\nquoted text\nitem one\nitem two");
    }

    #[test]
    fn reference_definitions_are_dropped() {
        let body = "See [docs][d].\n\n[d]: https://example.com";
        assert_eq!(sanitize_for_search(body), "See docs.");
    }
}
