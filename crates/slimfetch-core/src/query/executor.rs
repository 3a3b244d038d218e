//! Fetch executor for running fetch statements.
//!
//! The executor loads the root rows by key, then walks the join instructions
//! of the fetch plan in order, attaching related rows to the rows bound to
//! each parent alias. Records are materialized once every join has run.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use slimfetch_proto::{FieldValue, ProjectedRecord};

use super::join::JoinStep;
use super::rows::RowArena;
use super::statement::FetchQuery;
use crate::catalog::{Cardinality, RelationMapping};
use crate::context::{CompiledProjection, ExecutionContext};
use crate::error::Error;
use crate::projection::{ProjectedKind, ProjectionType};

/// Runs fetch statements against one execution context.
pub struct FetchExecutor<'a> {
    ctx: &'a ExecutionContext,
}

impl<'a> FetchExecutor<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Execute a fetch statement.
    ///
    /// Returns one record per found key, in key order. Missing keys are
    /// skipped and repeated keys yield a single record.
    pub fn execute(&self, query: &FetchQuery) -> Result<Vec<ProjectedRecord>, Error> {
        self.ctx.ensure_open()?;

        let root_type = query.projection();
        let root = self.compiled(root_type)?;
        for nested in root_type.with_nested() {
            self.compiled(&nested)?;
        }

        debug!(
            generation = self.ctx.generation(),
            statement = %query,
            keys = query.keys().len(),
            "executing fetch"
        );

        let storage = self.ctx.storage();
        let root_alias = query.plan().root_alias();
        let mut arena = RowArena::default();
        let mut roots = Vec::new();

        for key in query.keys() {
            if let Some(record) = storage.get_row(root.table(), key)? {
                let (index, new) = arena.insert(root_alias, key.clone(), &record, root)?;
                if new {
                    roots.push(index);
                }
            }
        }

        let mut bound: HashMap<&str, &Arc<ProjectionType>> = HashMap::new();
        bound.insert(root_alias, root_type);

        for join in query.plan().joins() {
            self.ctx.ensure_open()?;

            let parent_type = *bound.get(join.parent_alias.as_str()).ok_or_else(|| {
                Error::InvalidData(format!("unbound alias '{}'", join.parent_alias))
            })?;
            let field = parent_type.field(&join.field).ok_or_else(|| Error::UnknownField {
                path: format!("{}.{}", parent_type.template().name, join.field),
            })?;
            let (relation, target) = match &field.kind {
                ProjectedKind::Relation { relation, target } => (relation, target),
                ProjectedKind::Scalar(_) => {
                    return Err(Error::InvalidSelection {
                        path: format!("{}.{}", parent_type.template().name, join.field),
                        reason: "scalar field cannot be joined".into(),
                    })
                }
            };

            let parents = arena.rows(&join.parent_alias);
            let step = JoinStep {
                storage,
                parent: self.compiled(parent_type)?,
                child: self.compiled(target)?,
                field: &join.field,
                child_alias: &join.alias,
            };
            let joined = match &relation.mapping {
                RelationMapping::ForeignKey { column } => {
                    step.foreign_key(&mut arena, &parents, column)?
                }
                RelationMapping::MappedBy { column } => {
                    step.mapped_by(&mut arena, &parents, column)?
                }
                RelationMapping::LinkTable { table, .. } => {
                    step.link_table(&mut arena, &parents, table)?
                }
            };
            debug!(alias = %join.alias, parents = parents.len(), joined, "join step");

            bound.insert(&join.alias, target);
        }

        self.ctx.ensure_open()?;

        roots
            .into_iter()
            .map(|index| self.materialize(&arena, index, root_type))
            .collect()
    }

    fn compiled(&self, ty: &ProjectionType) -> Result<&'a CompiledProjection, Error> {
        let compiled = self.ctx.compiled(ty.shape())?;
        compiled.check()?;
        Ok(compiled)
    }

    fn materialize(
        &self,
        arena: &RowArena,
        index: usize,
        ty: &Arc<ProjectionType>,
    ) -> Result<ProjectedRecord, Error> {
        let compiled = self.compiled(ty)?;
        let node = arena.node(index);
        let mut record = ProjectedRecord::new(ty.name());

        for field in ty.fields() {
            let value = match &field.kind {
                ProjectedKind::Scalar(_) => {
                    FieldValue::Scalar(arena.value(index, compiled, &field.column))
                }
                ProjectedKind::Relation { relation, target } => {
                    let children = node
                        .relations
                        .get(&field.name)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    match relation.cardinality {
                        Cardinality::One => FieldValue::One(match children.first() {
                            Some(&child) => Some(Box::new(self.materialize(arena, child, target)?)),
                            None => None,
                        }),
                        Cardinality::Many => FieldValue::Many(
                            children
                                .iter()
                                .map(|&child| self.materialize(arena, child, target))
                                .collect::<Result<_, _>>()?,
                        ),
                    }
                }
            };
            record.push(field.name.clone(), value);
        }

        Ok(record)
    }
}
