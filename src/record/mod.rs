//! Record model: an ordered field map over a closed set of value variants.
//!
//! Every persisted record carries a unique string identifier under
//! [`ID_FIELD`]; equality of stored records is by that identifier. Values are
//! scalars (string, number, boolean, timestamp) or nested JSON structures,
//! never arbitrary dynamic objects.

mod field;

pub mod coerce;

pub use field::{FieldDefinition, LogicalType};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

/// Name of the identifier field every persisted record carries.
pub const ID_FIELD: &str = "id";

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    /// Nested structure (object or array), persisted as JSON text.
    Nested(serde_json::Value),
}

impl Value {
    /// Convert a JSON value into the closed variant set.
    ///
    /// Numbers become `Integer` when exactly representable, `Double`
    /// otherwise; objects and arrays stay nested.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            nested => Value::Nested(nested),
        }
    }

    /// Render the value as JSON; timestamps serialize as RFC 3339 text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Integer(i) => json!(i),
            Value::Double(d) => json!(d),
            Value::String(s) => json!(s),
            Value::Timestamp(ts) => json!(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Nested(v) => v.clone(),
        }
    }

    /// The string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer content, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The boolean content, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The timestamp content, if this is a timestamp value.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

/// An ordered mapping from field name to [`Value`].
///
/// Field order is preserved across set/serialize round trips; `set` on an
/// existing field replaces the value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any existing value while keeping its position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
        self
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a string field by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    /// The record identifier, if assigned.
    pub fn id(&self) -> Option<&str> {
        self.get_str(ID_FIELD)
    }

    /// Whether the record contains the named field.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Build a record from a JSON object, preserving field order.
    ///
    /// Returns `None` when the value is not an object.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut record = Record::new();
        for (name, v) in object {
            record.set(name.clone(), Value::from_json(v.clone()));
        }
        Some(record)
    }

    /// Render the record as a JSON object, preserving field order.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_set_replaces_in_place() {
        let mut record = Record::new();
        record.set("a", 1i64).set("b", 2i64).set("a", 3i64);
        assert_eq!(record.field_names(), vec!["a", "b"]);
        assert_eq!(record.get("a").and_then(Value::as_i64), Some(3));
    }

    #[test]
    fn test_id_accessor() {
        let mut record = Record::new();
        assert!(record.id().is_none());
        record.set(ID_FIELD, "r1");
        assert_eq!(record.id(), Some("r1"));
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"id":"x","name":"n","count":5,"flag":true}"#).unwrap();
        let record = Record::from_json(&json).unwrap();
        assert_eq!(record.field_names(), vec!["id", "name", "count", "flag"]);
        assert_eq!(record.to_json(), json);
    }

    #[test]
    fn test_number_variant_selection() {
        assert_eq!(Value::from_json(serde_json::json!(7)), Value::Integer(7));
        assert_eq!(Value::from_json(serde_json::json!(1.5)), Value::Double(1.5));
    }

    #[test]
    fn test_timestamp_serializes_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            Value::Timestamp(ts).to_json(),
            serde_json::json!("2020-01-02T03:04:05.000Z")
        );
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(Record::from_json(&serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn test_nested_values_survive() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"id":"x","tags":["a","b"]}"#).unwrap();
        let record = Record::from_json(&json).unwrap();
        assert!(matches!(record.get("tags"), Some(Value::Nested(_))));
        assert_eq!(record.to_json(), json);
    }
}
