//! Field definitions for templates.

use super::relation::RelationDef;
use super::types::ScalarType;

/// What a field holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A scalar column.
    Scalar(ScalarType),
    /// A relation to another template.
    Relation(RelationDef),
}

/// A field definition within a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name as seen by selections.
    pub name: String,
    /// Physical column name. Unused for relations not stored on the parent row.
    pub column: String,
    /// Field kind.
    pub kind: FieldKind,
    /// Whether the field is part of every projection of its template.
    pub mandatory: bool,
}

impl FieldDef {
    /// Create a scalar field stored in a column of the same name.
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        let name = name.into();
        Self {
            column: name.clone(),
            name,
            kind: FieldKind::Scalar(scalar),
            mandatory: false,
        }
    }

    /// Create a relation field.
    pub fn relation(name: impl Into<String>, relation: RelationDef) -> Self {
        let name = name.into();
        let column = relation
            .foreign_key_column()
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());
        Self {
            name,
            column,
            kind: FieldKind::Relation(relation),
            mandatory: false,
        }
    }

    /// Set the physical column name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Mark the field as mandatory.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn is_relation(&self) -> bool {
        matches!(self.kind, FieldKind::Relation(_))
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self.kind {
            FieldKind::Scalar(s) => Some(s),
            FieldKind::Relation(_) => None,
        }
    }

    pub fn relation_def(&self) -> Option<&RelationDef> {
        match &self.kind {
            FieldKind::Relation(r) => Some(r),
            FieldKind::Scalar(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_field() {
        let field = FieldDef::scalar("firstName", ScalarType::String).with_column("first_name");

        assert_eq!(field.name, "firstName");
        assert_eq!(field.column, "first_name");
        assert!(!field.mandatory);
        assert!(!field.is_relation());
        assert_eq!(field.scalar_type(), Some(ScalarType::String));
    }

    #[test]
    fn test_relation_field_column() {
        let fk = FieldDef::relation("author", RelationDef::many_to_one("Person", "author_id"));
        assert_eq!(fk.column, "author_id");
        assert!(fk.is_relation());

        let mapped = FieldDef::relation("quotes", RelationDef::one_to_many("Quote", "book_id"));
        assert_eq!(mapped.column, "quotes");
        assert!(mapped.relation_def().is_some_and(|r| r.is_many()));
    }
}
