//! Identifier quoting and scalar value stringification shared by every
//! backend adapter.
//!
//! Drivers decode cells into [`SqlValue`]; everything that reaches a
//! context document goes through [`format_value`], and every count the
//! enrichment engine reads goes through [`parse_count`].

use crate::{Result, error::DbContextError};
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

/// A single driver value, independent of the backend it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    /// Nested, array or JSON document values
    Json(JsonValue),
}

impl SqlValue {
    /// Builds a value from a JSON cell returned by a REST backend.
    ///
    /// BigQuery wraps record fields as `{"f": [...]}` and array elements and
    /// cells as `{"v": ...}`; those envelopes are removed first so nested
    /// values render as plain JSON.
    pub fn from_json(value: &JsonValue) -> Self {
        match unwrap_envelope(value) {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    n.as_f64().map_or(Self::Null, Self::Float)
                }
            }
            JsonValue::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }

    /// Whether the value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

fn unwrap_envelope(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) if map.len() == 1 && map.contains_key("v") => {
            map.get("v").map_or(JsonValue::Null, unwrap_envelope)
        }
        JsonValue::Object(map) if map.len() == 1 && map.contains_key("f") => match map.get("f") {
            Some(JsonValue::Array(fields)) => {
                JsonValue::Array(fields.iter().map(unwrap_envelope).collect())
            }
            Some(other) => unwrap_envelope(other),
            None => JsonValue::Null,
        },
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(unwrap_envelope).collect()),
        other => other.clone(),
    }
}

/// Renders a value as the string written into sample documents.
///
/// NULL becomes `NULL`, bytes are emitted as text when they are valid UTF-8
/// and as `base64:<data>` otherwise, timestamps use RFC3339 and nested
/// values are compact JSON.
pub fn format_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => b.to_string(),
        SqlValue::Int(i) => i.to_string(),
        SqlValue::UInt(u) => u.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => format!(
                "base64:{}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
        },
        SqlValue::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        SqlValue::Json(JsonValue::String(s)) => s.clone(),
        SqlValue::Json(json) => json.to_string(),
    }
}

/// Coerces a driver value into a row count.
///
/// # Errors
/// Returns a `Parse` error for values that are not whole numbers; a wrong
/// count would silently corrupt the profile.
pub fn parse_count(value: &SqlValue) -> Result<i64> {
    match value {
        SqlValue::Null => Ok(0),
        SqlValue::Int(i) => Ok(*i),
        SqlValue::UInt(u) => i64::try_from(*u)
            .map_err(|_| DbContextError::parse(format!("count {u} does not fit in i64"))),
        SqlValue::Float(f) => float_to_count(*f),
        SqlValue::Text(s) => parse_count_text(s),
        SqlValue::Bytes(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                DbContextError::parse("count returned as non-UTF-8 bytes".to_string())
            })?;
            parse_count_text(text)
        }
        SqlValue::Json(JsonValue::Number(n)) => n
            .as_i64()
            .map_or_else(|| float_to_count(n.as_f64().unwrap_or(f64::NAN)), Ok),
        SqlValue::Json(JsonValue::String(s)) => parse_count_text(s),
        SqlValue::Json(JsonValue::Null) => Ok(0),
        other => Err(DbContextError::parse(format!(
            "unexpected value for a count: {other:?}"
        ))),
    }
}

fn parse_count_text(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(i);
    }
    match trimmed.parse::<f64>() {
        Ok(f) => float_to_count(f),
        Err(_) => Err(DbContextError::parse(format!(
            "'{trimmed}' is not a number"
        ))),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_count(f: f64) -> Result<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e18 {
        Ok(f as i64)
    } else {
        Err(DbContextError::parse(format!("{f} is not a whole count")))
    }
}

/// Quotes an identifier with ANSI double quotes.
///
/// Used for Postgres, Redshift, Snowflake and SQLite.
pub fn quote_double(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quotes an identifier with backticks (MySQL, BigQuery).
pub fn quote_backtick(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Quotes a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_format_null_and_scalars() {
        assert_eq!(format_value(&SqlValue::Null), "NULL");
        assert_eq!(format_value(&SqlValue::Bool(true)), "true");
        assert_eq!(format_value(&SqlValue::Int(-42)), "-42");
        assert_eq!(format_value(&SqlValue::Float(1.5)), "1.5");
        assert_eq!(format_value(&SqlValue::Text("hi".to_string())), "hi");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_value(&SqlValue::Bytes(b"plain".to_vec())), "plain");
        assert_eq!(
            format_value(&SqlValue::Bytes(vec![0xff, 0xfe])),
            "base64://4="
        );
    }

    #[test]
    fn test_format_timestamp_is_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(format_value(&SqlValue::Timestamp(ts)), "2024-05-01T12:30:00Z");
    }

    #[test]
    fn test_from_json_unwraps_bigquery_envelopes() {
        let cell = json!({"v": {"f": [{"v": "1"}, {"v": [{"v": "a"}, {"v": "b"}]}]}});
        let value = SqlValue::from_json(&cell);
        assert_eq!(format_value(&value), r#"["1",["a","b"]]"#);

        assert_eq!(SqlValue::from_json(&json!({"v": null})), SqlValue::Null);
        assert_eq!(
            SqlValue::from_json(&json!({"v": "x"})),
            SqlValue::Text("x".to_string())
        );
    }

    #[test]
    fn test_from_json_object_is_compact_json() {
        let value = SqlValue::from_json(&json!({"a": 1, "b": [true]}));
        assert_eq!(format_value(&value), r#"{"a":1,"b":[true]}"#);
    }

    #[test]
    fn test_parse_count_accepts_driver_shapes() {
        assert_eq!(parse_count(&SqlValue::Null).unwrap(), 0);
        assert_eq!(parse_count(&SqlValue::Int(7)).unwrap(), 7);
        assert_eq!(parse_count(&SqlValue::UInt(8)).unwrap(), 8);
        assert_eq!(parse_count(&SqlValue::Float(3.0)).unwrap(), 3);
        assert_eq!(parse_count(&SqlValue::Text(" 12 ".to_string())).unwrap(), 12);
        assert_eq!(parse_count(&SqlValue::Text("4.0".to_string())).unwrap(), 4);
        assert_eq!(parse_count(&SqlValue::Bytes(b"99".to_vec())).unwrap(), 99);
        assert_eq!(parse_count(&SqlValue::Json(json!(5))).unwrap(), 5);
    }

    #[test]
    fn test_parse_count_rejects_garbage() {
        assert!(parse_count(&SqlValue::Text("abc".to_string())).is_err());
        assert!(parse_count(&SqlValue::Float(1.5)).is_err());
        assert!(parse_count(&SqlValue::Float(f64::NAN)).is_err());
        assert!(parse_count(&SqlValue::Bool(true)).is_err());
        assert!(parse_count(&SqlValue::UInt(u64::MAX)).is_err());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_double("my\"table"), "\"my\"\"table\"");
        assert_eq!(quote_backtick("my`table"), "`my``table`");
        assert_eq!(quote_literal("O'Brien"), "'O''Brien'");
    }
}
