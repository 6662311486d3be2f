//! Reconciles the shapes the backend uses for multi-valued fields.
//!
//! Depending on code path, `email` and `phone_number` arrive as a native JSON
//! array, a brace-delimited list string (`{a, b}`), a comma-joined string, or
//! null. Everything downstream only ever sees a `Vec<String>`.

use serde::Deserialize;
use serde_json::Value;

use crate::model::MultiValue;

/// A multi-valued field exactly as the backend sent it. `Other` catches
/// shapes that carry no usable value (booleans, objects) so one odd field
/// never fails the record it sits in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    List(Vec<Value>),
    Text(String),
    Number(serde_json::Number),
    Other(Value),
}

/// Normalize a raw backend field into an ordered list of values.
pub fn normalize(raw: Option<&RawField>) -> Vec<String> {
    match raw {
        None => Vec::new(),
        Some(RawField::List(items)) => items.iter().filter_map(list_item).collect(),
        Some(RawField::Text(text)) => split_text(text),
        Some(RawField::Number(number)) => split_text(&number.to_string()),
        Some(RawField::Other(_)) => Vec::new(),
    }
}

/// Strings are kept as sent, numbers rendered in decimal. Nulls and nested
/// values are dropped.
fn list_item(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Split a text-encoded list. Brace-wrapped strings are the backend's array
/// serialization and are split on `", "`; anything else on `,`.
pub fn split_text(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let parts: Vec<&str> = match text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        Some(inner) => inner.split(", ").collect(),
        None => text.split(',').collect(),
    };

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Collapse a normalized list back to a scalar when it holds at most one
/// value, for single-value consumers.
pub fn flatten(values: Vec<String>) -> MultiValue {
    MultiValue::from_values(values)
}
