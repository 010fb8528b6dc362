//! Input values and records.
//!
//! Records arrive already cast to each field's declared type, so a value is
//! either a number or a string (categories, text and item lists are all
//! carried as strings).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single typed input value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the value, if it is a number.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// String view of the value, if it is a string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One input record: field id to typed value.
///
/// A field absent from the map is *missing*. When deserialized from JSON,
/// `null` entries are dropped and therefore count as missing too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, Option<Value>>", into = "HashMap<String, Value>")]
pub struct InputRecord {
    values: HashMap<String, Value>,
}

impl InputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value (builder pattern).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    #[inline]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    #[inline]
    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, Option<Value>>> for InputRecord {
    fn from(raw: HashMap<String, Option<Value>>) -> Self {
        raw.into_iter()
            .filter_map(|(field, value)| value.map(|v| (field, v)))
            .collect()
    }
}

impl From<InputRecord> for HashMap<String, Value> {
    fn from(record: InputRecord) -> Self {
        record.values
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for InputRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_are_missing() {
        let record: InputRecord =
            serde_json::from_str(r#"{"000000": 1.5, "000001": null, "000002": "red"}"#).unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("000000"), Some(&Value::Number(1.5)));
        assert!(!record.contains("000001"));
        assert_eq!(record.get("000002").and_then(Value::as_str), Some("red"));
    }

    #[test]
    fn builder_and_display() {
        let record = InputRecord::new().with("a", 3.0).with("b", "x");
        assert_eq!(record.get("a").unwrap().to_string(), "3");
        assert_eq!(record.get("b").unwrap().to_string(), "x");
    }
}
