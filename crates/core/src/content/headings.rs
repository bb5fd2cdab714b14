//! Heading detection and hierarchy.

/// A detected heading with its position in the document outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Nesting level, 1-6.
    pub level: u8,
    pub text: String,
    /// URL-safe anchor slug.
    pub slug: String,
    /// Texts of the ancestor headings, outermost first.
    pub ancestors: Vec<String>,
    /// 1-based line number.
    pub line: usize,
}

/// Extract headings in both `#`-prefixed and underline styles, skipping
/// fenced code blocks, and compute each heading's ancestor chain from
/// nesting levels.
pub fn extract_headings(body: &str) -> Vec<Heading> {
    let lines: Vec<&str> = body.lines().collect();
    let mut headings = Vec::new();
    // Stack of (level, text) for open ancestor headings
    let mut stack: Vec<(u8, String)> = Vec::new();
    let mut in_fence = false;
    let mut skip_next = false;

    for (i, line) in lines.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let parsed = if let Some((level, text)) = parse_atx(trimmed) {
            Some((level, text))
        } else if let Some(level) = underline_level(lines.get(i + 1).copied(), trimmed) {
            skip_next = true;
            Some((level, trimmed.trim_end().to_string()))
        } else {
            None
        };

        let Some((level, text)) = parsed else { continue };

        while stack.last().is_some_and(|(l, _)| *l >= level) {
            stack.pop();
        }
        let ancestors: Vec<String> = stack.iter().map(|(_, t)| t.clone()).collect();

        headings.push(Heading {
            level,
            slug: slugify(&text),
            ancestors,
            text: text.clone(),
            line: i + 1,
        });
        stack.push((level, text));
    }

    headings
}

fn parse_atx(line: &str) -> Option<(u8, String)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.is_empty() && !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }

    let mut text = rest.trim();
    // Strip a closing hash run when separated from the text by a space
    let without_hashes = text.trim_end_matches('#');
    if without_hashes.len() < text.len()
        && (without_hashes.is_empty() || without_hashes.ends_with(' '))
    {
        text = without_hashes.trim_end();
    }

    if text.is_empty() {
        return None;
    }
    Some((hashes as u8, text.to_string()))
}

/// Level of a setext heading when `next` is an underline for the current
/// non-empty, non-ATX text line.
fn underline_level(next: Option<&str>, current: &str) -> Option<u8> {
    if current.is_empty() || current.starts_with('#') || is_list_item(current) {
        return None;
    }
    let next = next?.trim();
    if !next.is_empty() && next.chars().all(|c| c == '=') {
        return Some(1);
    }
    if next.len() >= 2 && next.chars().all(|c| c == '-') {
        return Some(2);
    }
    None
}

fn is_list_item(line: &str) -> bool {
    matches!(line.as_bytes().first(), Some(b'-' | b'*' | b'+'))
        && line.as_bytes().get(1).is_none_or(|b| *b == b' ')
}

/// Produce a URL-safe anchor slug: lowercase, runs of non-alphanumerics
/// collapsed to single hyphens, no leading or trailing hyphen.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_hyphen = true;
        }
    }

    slug
}
