//! Typed frontmatter values.
//!
//! Frontmatter values are represented as a closed sum type rather than a
//! dynamic serialization value, with recursive cases for arrays and
//! objects. Strings that look like another type keep their raw text
//! alongside the parsed interpretation so consumers can choose either.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// A typed frontmatter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// An ISO-like date or date-time string; the raw text is preserved.
    Date(String),
    Str(String),
    /// A string that also reads as a boolean word ("yes", "off", ...).
    StrBool { raw: String, value: bool },
    /// A string that also reads as a numeral.
    StrNumber { raw: String, value: f64 },
    Array(Vec<FieldValue>),
    Object(Vec<(String, FieldValue)>),
}

impl FieldValue {
    /// Kind tag stored alongside the value in the derived store.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) | Self::Float(_) => "number",
            Self::Date(_) => "date",
            Self::Str(_) => "string",
            Self::StrBool { .. } => "string_boolean",
            Self::StrNumber { .. } => "string_number",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Stringified form stored in the derived store. Scalars keep their
    /// raw text; containers serialize as JSON.
    pub fn storage_value(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Date(raw)
            | Self::Str(raw)
            | Self::StrBool { raw, .. }
            | Self::StrNumber { raw, .. } => raw.clone(),
            Self::Array(_) | Self::Object(_) => {
                serde_json::to_string(&self.to_json()).unwrap_or_default()
            }
        }
    }

    /// Plain-string view for scalar values, used where only text makes
    /// sense (titles, tag lists).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Date(raw)
            | Self::Str(raw)
            | Self::StrBool { raw, .. }
            | Self::StrNumber { raw, .. } => Some(raw),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::Float(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Date(raw)
            | Self::Str(raw)
            | Self::StrBool { raw, .. }
            | Self::StrNumber { raw, .. } => serde_json::Value::String(raw.clone()),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Object(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Convert a YAML value, classifying strings on the way in.
    pub fn from_yaml(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(b) => Self::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_yaml::Value::String(s) => Self::classify_str(&s),
            serde_yaml::Value::Sequence(items) => {
                Self::Array(items.into_iter().map(Self::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (yaml_key_to_string(&k), Self::from_yaml(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }

    /// Convert a TOML value. TOML has a native datetime type, which maps
    /// straight to the date kind.
    pub fn from_toml(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Self::classify_str(&s),
            toml::Value::Integer(i) => Self::Integer(i),
            toml::Value::Float(f) => Self::Float(f),
            toml::Value::Boolean(b) => Self::Bool(b),
            toml::Value::Datetime(dt) => Self::Date(dt.to_string()),
            toml::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_toml).collect())
            }
            toml::Value::Table(table) => Self::Object(
                table.into_iter().map(|(k, v)| (k, Self::from_toml(v))).collect(),
            ),
        }
    }

    /// Convert a JSON value, classifying strings on the way in.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Self::classify_str(&s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect(),
            ),
        }
    }

    /// Classify a raw string: ISO-like dates become the date kind,
    /// boolean words and numerals become hybrid kinds, everything else
    /// stays a plain string.
    pub fn classify_str(raw: &str) -> Self {
        let trimmed = raw.trim();

        if is_date_like(trimmed) {
            return Self::Date(raw.to_string());
        }

        if let Some(value) = parse_bool_word(trimmed) {
            return Self::StrBool { raw: raw.to_string(), value };
        }

        if let Some(value) = parse_numeral(trimmed) {
            return Self::StrNumber { raw: raw.to_string(), value };
        }

        Self::Str(raw.to_string())
    }
}

fn yaml_key_to_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

fn is_date_like(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || DateTime::parse_from_rfc3339(s).is_ok()
}

fn parse_bool_word(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_numeral(s: &str) -> Option<f64> {
    let first = s.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '+' | '-' | '.')) {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}
