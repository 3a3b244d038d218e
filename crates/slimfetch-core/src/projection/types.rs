//! Projection type descriptors.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::catalog::{Cardinality, EntityTemplate, RelationDef, ScalarType};

use super::shape::ShapeId;

/// A minimal view of a template: the selected fields plus the mandatory ones.
///
/// Relation fields point at the projection type of their own child
/// selection. Types are immutable and shared through `Arc`.
#[derive(Debug)]
pub struct ProjectionType {
    sequence: u64,
    name: String,
    shape: ShapeId,
    template: Arc<EntityTemplate>,
    fields: Vec<ProjectedField>,
}

/// One field of a projection type.
#[derive(Debug)]
pub struct ProjectedField {
    pub name: String,
    pub column: String,
    pub kind: ProjectedKind,
}

#[derive(Debug)]
pub enum ProjectedKind {
    Scalar(ScalarType),
    Relation {
        relation: RelationDef,
        target: Arc<ProjectionType>,
    },
}

impl ProjectionType {
    pub(crate) fn new(
        sequence: u64,
        shape: ShapeId,
        template: Arc<EntityTemplate>,
        fields: Vec<ProjectedField>,
    ) -> Self {
        Self {
            name: format!("{}$proj{}", template.name, sequence),
            sequence,
            shape,
            template,
            fields,
        }
    }

    /// Generated type name, `Template$proj<N>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Full shape identifier the type was built for.
    pub fn shape(&self) -> &ShapeId {
        &self.shape
    }

    pub fn template(&self) -> &Arc<EntityTemplate> {
        &self.template
    }

    pub fn fields(&self) -> &[ProjectedField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ProjectedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// This type followed by every nested type, each shape listed once.
    pub fn with_nested(self: &Arc<Self>) -> Vec<Arc<ProjectionType>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![self.clone()];

        while let Some(ty) = stack.pop() {
            if !seen.insert(ty.shape.clone()) {
                continue;
            }
            for field in ty.fields.iter().rev() {
                if let ProjectedKind::Relation { target, .. } = &field.kind {
                    stack.push(target.clone());
                }
            }
            out.push(ty);
        }

        out
    }
}

impl ProjectedField {
    pub fn target(&self) -> Option<&Arc<ProjectionType>> {
        match &self.kind {
            ProjectedKind::Relation { target, .. } => Some(target),
            ProjectedKind::Scalar(_) => None,
        }
    }

    pub fn cardinality(&self) -> Option<Cardinality> {
        match &self.kind {
            ProjectedKind::Relation { relation, .. } => Some(relation.cardinality),
            ProjectedKind::Scalar(_) => None,
        }
    }
}

impl fmt::Display for ProjectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.shape)
    }
}
