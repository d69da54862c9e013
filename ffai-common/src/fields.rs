//! Submission field model
//!
//! Form submissions carry arbitrary field values. Every value is normalized
//! into either a single scalar string or a list of strings at the boundary,
//! so formatting code only ever matches on [`FieldValue`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Submitted form fields keyed by field name
///
/// Ordered so that "all fields" prompt output is deterministic.
pub type FormFields = BTreeMap<String, FieldValue>;

/// One submitted field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Build a scalar value
    pub fn scalar(value: impl Into<String>) -> Self {
        FieldValue::Scalar(value.into())
    }

    /// Build a list value
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }

    /// Text form used in prompts and templates (lists are comma-joined)
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Scalar(s) => s.clone(),
            FieldValue::List(items) => items.join(", "),
        }
    }

    /// Scalar contents, if this is a scalar
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) => Some(s.as_str()),
            FieldValue::List(_) => None,
        }
    }

    /// Individual values: the scalar, or each list item
    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::Scalar(s) => vec![s.as_str()],
            FieldValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// True for an empty scalar or a list with no non-empty items
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Scalar(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }

    /// Normalize an arbitrary JSON value
    ///
    /// Numbers and booleans are stringified, null becomes an empty scalar.
    /// Objects (e.g. compound name fields) become a list of their values in
    /// key order.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => FieldValue::List(items.into_iter().map(json_to_text).collect()),
            Value::Object(map) => FieldValue::List(map.into_iter().map(|(_, v)| json_to_text(v)).collect()),
            other => FieldValue::Scalar(json_to_text(other)),
        }
    }
}

fn json_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(FieldValue::from_json)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        FieldValue::List(values)
    }
}

/// Flatten fields into key → text pairs for template rendering
pub fn flatten(fields: &FormFields) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), value.as_text()))
        .collect()
}
