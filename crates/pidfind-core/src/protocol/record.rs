//! Decoded packet records.
//!
//! A [`Record`] keeps its fields in declaration order so that re-encoding and
//! JSON dumps both follow the layout of the definition it came from.

use crate::error::Result;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A single decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// One byte, nonzero is true
    Bool(bool),
    /// Unsigned 8-bit integer
    Byte(u8),
    /// Signed 8-bit integer
    Int8(i8),
    /// Signed 16-bit integer
    Int16(i16),
    /// Unsigned 16-bit integer
    UInt16(u16),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 32-bit integer
    UInt32(u32),
    /// Signed 64-bit integer
    Int64(i64),
    /// Unsigned 64-bit integer
    UInt64(u64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Three 32-bit floats
    Vec3([f32; 3]),
    /// Length-prefixed UTF-8 text
    String(String),
    /// Length-prefixed raw bytes
    Bytes(Vec<u8>),
    /// Count-prefixed homogeneous elements
    Array(Vec<Value>),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Byte(v) => serializer.serialize_u8(*v),
            Value::Int8(v) => serializer.serialize_i8(*v),
            Value::Int16(v) => serializer.serialize_i16(*v),
            Value::UInt16(v) => serializer.serialize_u16(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::UInt32(v) => serializer.serialize_u32(*v),
            // 64-bit values lose precision in most JSON consumers
            Value::Int64(v) => serializer.serialize_str(&v.to_string()),
            Value::UInt64(v) => serializer.serialize_str(&v.to_string()),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Vec3([x, y, z]) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("x", x)?;
                map.serialize_entry("y", y)?;
                map.serialize_entry("z", z)?;
                map.end()
            }
            Value::String(v) => serializer.serialize_str(v),
            Value::Bytes(v) => serializer.serialize_str(&hex::encode(v)),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// A decoded packet: named fields in definition order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    /// Builder form of [`Record::push`]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.push(name, value);
        self
    }

    /// Looks up a field by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Iterates fields in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the record as indented JSON, 64-bit integers as decimal strings
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only ever writes valid UTF-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_and_order() {
        let record = Record::new()
            .with("b", Value::Byte(1))
            .with("a", Value::Bool(true));

        assert_eq!(record.get("a"), Some(&Value::Bool(true)));
        assert_eq!(record.get("missing"), None);
        let names: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_json_large_integers_as_strings() {
        let record = Record::new()
            .with("gameId", Value::UInt64(u64::MAX))
            .with("delta", Value::Int64(-5))
            .with("hp", Value::Int32(-5));

        let json = record.to_json_pretty().unwrap();
        assert_eq!(
            json,
            "{\n    \"gameId\": \"18446744073709551615\",\n    \"delta\": \"-5\",\n    \"hp\": -5\n}"
        );
    }

    #[test]
    fn test_json_nested_values() {
        let record = Record::new()
            .with("pos", Value::Vec3([1.0, 2.5, -3.0]))
            .with("blob", Value::Bytes(vec![0xde, 0xad]))
            .with("ids", Value::Array(vec![Value::UInt16(1), Value::UInt16(2)]));

        let parsed: serde_json::Value = serde_json::from_str(&record.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed["pos"]["y"], 2.5);
        assert_eq!(parsed["blob"], "dead");
        assert_eq!(parsed["ids"][1], 2);
    }
}
