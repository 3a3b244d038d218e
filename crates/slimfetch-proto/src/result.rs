//! Projected records returned by the resolver.
//!
//! A `ProjectedRecord` holds exactly the fields of the projection it was read
//! through, in projection order. Serializing a record produces a JSON-style
//! map with one entry per projected field.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::value::Value;

/// One record read through a projection type.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRecord {
    projection: String,
    fields: Vec<(String, FieldValue)>,
}

/// The value of one projected field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A scalar column.
    Scalar(Value),
    /// A single-valued relation; `None` when the reference is null or dangling.
    One(Option<Box<ProjectedRecord>>),
    /// A multi-valued relation.
    Many(Vec<ProjectedRecord>),
}

impl ProjectedRecord {
    /// Create an empty record for the named projection type.
    pub fn new(projection: impl Into<String>) -> Self {
        Self {
            projection: projection.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field value.
    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.push(name, value);
        self
    }

    /// Name of the projection type this record was read through.
    pub fn projection(&self) -> &str {
        &self.projection
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a scalar field value by name.
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Get a single-valued relation by name.
    pub fn one(&self, name: &str) -> Option<&ProjectedRecord> {
        match self.get(name)? {
            FieldValue::One(Some(r)) => Some(r),
            _ => None,
        }
    }

    /// Get a multi-valued relation by name.
    pub fn many(&self, name: &str) -> Option<&[ProjectedRecord]> {
        match self.get(name)? {
            FieldValue::Many(rs) => Some(rs),
            _ => None,
        }
    }

    /// Field names in projection order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl FieldValue {
    /// Render as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Scalar(v) => v.to_json(),
            FieldValue::One(None) => serde_json::Value::Null,
            FieldValue::One(Some(r)) => r.to_json(),
            FieldValue::Many(rs) => serde_json::Value::Array(rs.iter().map(|r| r.to_json()).collect()),
        }
    }
}

impl Serialize for ProjectedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Scalar(v) => v.to_json().serialize(serializer),
            FieldValue::One(None) => serializer.serialize_none(),
            FieldValue::One(Some(r)) => r.serialize(serializer),
            FieldValue::Many(rs) => {
                let mut seq = serializer.serialize_seq(Some(rs.len()))?;
                for r in rs {
                    seq.serialize_element(r)?;
                }
                seq.end()
            }
        }
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Scalar(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> ProjectedRecord {
        let author = ProjectedRecord::new("Person$proj1")
            .with("id", Value::Int32(7).into())
            .with("name", Value::String("Ada".into()).into());
        ProjectedRecord::new("Book$proj0")
            .with("id", Value::Int32(1).into())
            .with("author", FieldValue::One(Some(Box::new(author))))
            .with("quotes", FieldValue::Many(vec![]))
    }

    #[test]
    fn test_accessors() {
        let record = sample();
        assert_eq!(record.projection(), "Book$proj0");
        assert_eq!(record.field_names(), vec!["id", "author", "quotes"]);
        assert_eq!(record.scalar("id"), Some(&Value::Int32(1)));
        assert_eq!(
            record.one("author").and_then(|a| a.scalar("name")),
            Some(&Value::String("Ada".into()))
        );
        assert_eq!(record.many("quotes").map(|q| q.len()), Some(0));
        assert!(record.get("title").is_none());
    }

    #[test]
    fn test_serializes_requested_shape_only() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1,
                "author": { "id": 7, "name": "Ada" },
                "quotes": []
            })
        );
        assert_eq!(json, sample().to_json());
    }

    #[test]
    fn test_null_single_relation() {
        let record =
            ProjectedRecord::new("Book$proj0").with("author", FieldValue::One(None));
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"author":null}"#);
    }
}
