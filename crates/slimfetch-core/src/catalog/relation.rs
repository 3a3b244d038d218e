//! Relation definitions between templates.

/// Cardinality of a relation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Single-valued relation (many-to-one, one-to-one).
    One,
    /// Multi-valued relation (one-to-many, many-to-many).
    Many,
}

/// How a relation is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationMapping {
    /// The parent row stores the target key in `column`.
    ForeignKey { column: String },
    /// Target rows store the parent key in `column`.
    MappedBy { column: String },
    /// A link table holds `(parent key, target key)` pairs.
    LinkTable {
        table: String,
        source_column: String,
        target_column: String,
    },
}

/// A relation from one template to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    /// Target template name.
    pub target: String,
    /// Relation cardinality.
    pub cardinality: Cardinality,
    /// Storage mapping.
    pub mapping: RelationMapping,
}

impl RelationDef {
    /// Create a many-to-one relation through a foreign-key column on the parent.
    pub fn many_to_one(target: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cardinality: Cardinality::One,
            mapping: RelationMapping::ForeignKey {
                column: column.into(),
            },
        }
    }

    /// Create a one-to-many relation whose target rows reference the parent.
    pub fn one_to_many(target: impl Into<String>, mapped_by: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cardinality: Cardinality::Many,
            mapping: RelationMapping::MappedBy {
                column: mapped_by.into(),
            },
        }
    }

    /// Create the non-owning side of a one-to-one relation.
    pub fn one_to_one_mapped_by(target: impl Into<String>, mapped_by: impl Into<String>) -> Self {
        Self {
            cardinality: Cardinality::One,
            ..Self::one_to_many(target, mapped_by)
        }
    }

    /// Create a many-to-many relation through a link table.
    pub fn many_to_many(
        target: impl Into<String>,
        table: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            cardinality: Cardinality::Many,
            mapping: RelationMapping::LinkTable {
                table: table.into(),
                source_column: source_column.into(),
                target_column: target_column.into(),
            },
        }
    }

    /// Check if this is a multi-valued relation.
    pub fn is_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    /// The parent-row column holding the target key, for foreign-key relations.
    pub fn foreign_key_column(&self) -> Option<&str> {
        match &self.mapping {
            RelationMapping::ForeignKey { column } => Some(column),
            _ => None,
        }
    }
}
