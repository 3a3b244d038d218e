//! Entity templates.

use super::field::FieldDef;
use super::types::ScalarType;

/// An entity template: the fields a selection may name and where they live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTemplate {
    /// Template name (unique within the registry).
    pub name: String,
    /// Backing table name.
    pub table: String,
    /// Name of the identity field.
    pub identity_field: String,
    /// Field definitions in declaration order.
    pub fields: Vec<FieldDef>,
}

impl EntityTemplate {
    /// Create a new template.
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        identity_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            identity_field: identity_field.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field to the template.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get the identity field definition.
    pub fn get_identity_field(&self) -> Option<&FieldDef> {
        self.get_field(&self.identity_field)
    }

    /// Type of the identity field.
    pub fn identity_type(&self) -> Option<ScalarType> {
        self.get_identity_field().and_then(FieldDef::scalar_type)
    }

    /// Whether a field must appear in every projection of this template.
    pub fn is_mandatory(&self, field: &FieldDef) -> bool {
        field.mandatory || field.name == self.identity_field
    }

    /// Mandatory fields in declaration order.
    pub fn mandatory_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| self.is_mandatory(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RelationDef;

    fn book() -> EntityTemplate {
        EntityTemplate::new("Book", "book", "id")
            .with_field(FieldDef::scalar("id", ScalarType::Int32))
            .with_field(FieldDef::scalar("title", ScalarType::String))
            .with_field(FieldDef::scalar("isbn", ScalarType::String).mandatory())
            .with_field(FieldDef::relation(
                "author",
                RelationDef::many_to_one("Person", "author_id"),
            ))
    }

    #[test]
    fn test_get_field() {
        let template = book();

        assert!(template.get_field("title").is_some());
        assert!(template.get_field("nonexistent").is_none());
        assert_eq!(template.identity_type(), Some(ScalarType::Int32));
    }

    #[test]
    fn test_mandatory_fields() {
        let template = book();
        let names: Vec<_> = template.mandatory_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "isbn"]);
    }
}
