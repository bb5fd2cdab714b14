//! Frontmatter block detection and parsing.
//!
//! Three leading-block serializations are recognized: YAML between `---`
//! delimiters, TOML between `+++` delimiters, and a bare JSON object.
//! Absence of a recognizable block yields an empty map; a malformed
//! block degrades to an empty map while the body is still parsed.

use std::collections::BTreeMap;

use super::value::FieldValue;

/// Result of splitting a document into frontmatter fields and body.
#[derive(Debug, Clone, Default)]
pub struct SplitDocument {
    /// Typed frontmatter fields. Empty when no block was found or the
    /// block was malformed.
    pub fields: BTreeMap<String, FieldValue>,
    /// Everything after the frontmatter block.
    pub body: String,
}

/// Split a document and parse its frontmatter block, if any.
pub fn parse(content: &str) -> SplitDocument {
    let trimmed = content.trim_start();

    if trimmed.starts_with("---") {
        return parse_delimited(content, trimmed, "---", parse_yaml_fields);
    }
    if trimmed.starts_with("+++") {
        return parse_delimited(content, trimmed, "+++", parse_toml_fields);
    }
    if trimmed.starts_with('{') {
        return parse_json_block(content, trimmed);
    }

    SplitDocument { fields: BTreeMap::new(), body: content.to_string() }
}

fn parse_delimited(
    content: &str,
    trimmed: &str,
    delim: &str,
    parse_fields: fn(&str) -> Option<BTreeMap<String, FieldValue>>,
) -> SplitDocument {
    let after_first = &trimmed[delim.len()..];
    let after_newline = after_first
        .strip_prefix("\r\n")
        .or_else(|| after_first.strip_prefix('\n'))
        .unwrap_or(after_first);

    let Some((block, body)) = split_at_closing_delimiter(after_newline, delim) else {
        // No closing delimiter: not a recognizable block
        return SplitDocument { fields: BTreeMap::new(), body: content.to_string() };
    };

    let fields = if block.trim().is_empty() {
        BTreeMap::new()
    } else {
        parse_fields(block).unwrap_or_else(|| {
            tracing::debug!("malformed frontmatter block, continuing with empty map");
            BTreeMap::new()
        })
    };

    SplitDocument { fields, body: body.to_string() }
}

/// Find a line consisting solely of the delimiter and split around it.
fn split_at_closing_delimiter<'a>(
    content: &'a str,
    delim: &str,
) -> Option<(&'a str, &'a str)> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim() == delim {
            let block = &content[..offset];
            let body = &content[offset + line.len()..];
            return Some((block, body));
        }
        offset += line.len();
    }
    None
}

fn parse_yaml_fields(block: &str) -> Option<BTreeMap<String, FieldValue>> {
    let value: serde_yaml::Value = serde_yaml::from_str(block).ok()?;
    let serde_yaml::Value::Mapping(map) = value else {
        return None;
    };
    let mut fields = BTreeMap::new();
    for (key, value) in map {
        let key = match key {
            serde_yaml::Value::String(s) => s,
            other => serde_yaml::to_string(&other).ok()?.trim().to_string(),
        };
        fields.insert(key, FieldValue::from_yaml(value));
    }
    Some(fields)
}

fn parse_toml_fields(block: &str) -> Option<BTreeMap<String, FieldValue>> {
    let table: toml::Table = toml::from_str(block).ok()?;
    Some(table.into_iter().map(|(k, v)| (k, FieldValue::from_toml(v))).collect())
}

fn parse_json_block(content: &str, trimmed: &str) -> SplitDocument {
    let Some(end) = matching_brace(trimmed) else {
        return SplitDocument { fields: BTreeMap::new(), body: content.to_string() };
    };

    let block = &trimmed[..=end];
    match serde_json::from_str::<serde_json::Value>(block) {
        Ok(serde_json::Value::Object(map)) => {
            let fields =
                map.into_iter().map(|(k, v)| (k, FieldValue::from_json(v))).collect();
            let body = trimmed[end + 1..]
                .strip_prefix("\r\n")
                .or_else(|| trimmed[end + 1..].strip_prefix('\n'))
                .unwrap_or(&trimmed[end + 1..]);
            SplitDocument { fields, body: body.to_string() }
        }
        // A leading brace that is not a JSON object is ordinary body text
        _ => SplitDocument { fields: BTreeMap::new(), body: content.to_string() },
    }
}

/// Byte offset of the brace closing the object that opens at offset 0,
/// tracking string literals and escapes.
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_frontmatter() {
        let doc = parse("# Hello\n\nSome content");
        assert!(doc.fields.is_empty());
        assert_eq!(doc.body, "# Hello\n\nSome content");
    }

    #[test]
    fn yaml_block() {
        let doc = parse("---\ntitle: Hello\ncount: 3\n---\n# Content");
        assert_eq!(doc.fields["title"], FieldValue::Str("Hello".to_string()));
        assert_eq!(doc.fields["count"], FieldValue::Integer(3));
        assert_eq!(doc.body, "# Content");
    }

    #[test]
    fn toml_block() {
        let doc = parse("+++\ntitle = \"Hello\"\ndraft = true\n+++\nBody");
        assert_eq!(doc.fields["title"], FieldValue::Str("Hello".to_string()));
        assert_eq!(doc.fields["draft"], FieldValue::Bool(true));
        assert_eq!(doc.body, "Body");
    }

    #[test]
    fn json_block() {
        let doc = parse("{\"title\": \"Hello\", \"n\": 2}\n# Content");
        assert_eq!(doc.fields["title"], FieldValue::Str("Hello".to_string()));
        assert_eq!(doc.fields["n"], FieldValue::Integer(2));
        assert_eq!(doc.body, "# Content");
    }

    #[test]
    fn empty_yaml_block() {
        let doc = parse("---\n---\n# Content");
        assert!(doc.fields.is_empty());
        assert_eq!(doc.body, "# Content");
    }

    #[test]
    fn malformed_yaml_degrades_to_empty_map() {
        let doc = parse("---\ntitle: [unclosed\n---\n# Content");
        assert!(doc.fields.is_empty());
        assert_eq!(doc.body, "# Content");
    }

    #[test]
    fn unclosed_block_is_body_text() {
        let content = "---\ntitle: Hello\n# Content";
        let doc = parse(content);
        assert!(doc.fields.is_empty());
        assert_eq!(doc.body, content);
    }

    #[test]
    fn crlf_delimiters() {
        let doc = parse("---\r\ntitle: Hello\r\n---\r\n# Content");
        assert_eq!(doc.fields["title"], FieldValue::Str("Hello".to_string()));
        assert_eq!(doc.body, "# Content");
    }

    #[test]
    fn json_with_braces_in_strings() {
        let doc = parse("{\"title\": \"a } b\"}\nBody");
        assert_eq!(doc.fields["title"], FieldValue::Str("a } b".to_string()));
        assert_eq!(doc.body, "Body");
    }

    #[test]
    fn closing_delimiter_without_trailing_newline() {
        let doc = parse("---\ntitle: Hello\n---");
        assert_eq!(doc.fields["title"], FieldValue::Str("Hello".to_string()));
        assert_eq!(doc.body, "");
    }
}
