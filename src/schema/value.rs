//! Stored attribute values and their kinds.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// The declared type of a model attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Integer,
    Boolean,
    Timestamp,
    /// Array-like attribute. Queried with containment predicates.
    List,
}

impl ValueKind {
    /// Check whether values of this kind hold several elements.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, ValueKind::List)
    }
}

/// A value stored on an entity attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Timestamp(DateTime<Utc>),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Build a value from JSON, mapping arrays to lists and RFC 3339 strings
    /// to plain text (timestamps must be constructed explicitly).
    pub fn from_json(value: &serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.iter().map(FieldValue::from_json).collect())
            }
            serde_json::Value::Object(_) => FieldValue::Text(value.to_string()),
        }
    }

    /// Check whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Flatten the value into the strings stored in the search index.
    ///
    /// Lists contribute one string per element. Null contributes nothing.
    pub fn index_strings(&self) -> Vec<String> {
        match self {
            FieldValue::Null => Vec::new(),
            FieldValue::List(items) => items.iter().flat_map(|v| v.index_strings()).collect(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Boolean(b) => write!(f, "{b}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Timestamp(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(" "))
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}
