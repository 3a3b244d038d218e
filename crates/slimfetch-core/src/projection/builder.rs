//! Builds projection types from validated selections.

use std::sync::Arc;

use slimfetch_proto::SelectionSet;

use super::cache::ProjectionCache;
use super::shape::ShapeId;
use super::types::{ProjectedField, ProjectedKind, ProjectionType};
use crate::catalog::{EntityTemplate, FieldKind};
use crate::error::Error;

/// Derives the minimal projection type for a selection.
///
/// Walks the template in declaration order. Selected scalars and unselected
/// mandatory fields are kept; a relation selected with a child selection is
/// kept with the child's projection type, obtained through the cache so
/// nested shapes are shared; everything else is left out.
pub(crate) struct ProjectionBuilder<'a> {
    cache: &'a ProjectionCache,
}

impl<'a> ProjectionBuilder<'a> {
    pub(crate) fn new(cache: &'a ProjectionCache) -> Self {
        Self { cache }
    }

    pub(crate) fn build(
        &self,
        template: &Arc<EntityTemplate>,
        selection: &SelectionSet,
        shape: ShapeId,
        sequence: u64,
    ) -> Result<ProjectionType, Error> {
        let mut fields = Vec::new();

        for field in &template.fields {
            let kind = match (selection.get(&field.name), &field.kind) {
                (Some(_), FieldKind::Scalar(ty)) => ProjectedKind::Scalar(*ty),
                (Some(selected), FieldKind::Relation(rel)) if !selected.is_leaf() => {
                    let target_template = self.cache.registry().get(&rel.target).ok_or_else(|| {
                        Error::BuildFailure {
                            shape: shape.to_string(),
                            reason: format!("template '{}' is not registered", rel.target),
                        }
                    })?;
                    let target = self
                        .cache
                        .get_or_build_nested(target_template, selected.selection())?;
                    ProjectedKind::Relation {
                        relation: rel.clone(),
                        target,
                    }
                }
                (None, FieldKind::Scalar(ty)) if template.is_mandatory(field) => {
                    ProjectedKind::Scalar(*ty)
                }
                _ => continue,
            };

            fields.push(ProjectedField {
                name: field.name.clone(),
                column: field.column.clone(),
                kind,
            });
        }

        Ok(ProjectionType::new(sequence, shape, template.clone(), fields))
    }
}
