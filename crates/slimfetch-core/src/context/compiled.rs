//! Projections compiled against the table schemas of the store.

use std::sync::Arc;

use crate::catalog::RelationMapping;
use crate::error::Error;
use crate::projection::{ProjectedKind, ProjectionType, ShapeId};
use crate::storage::{StorageEngine, TableSchema};

/// A schema problem found while compiling; reported when the projection is queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileIssue {
    UnknownTable(String),
    MissingColumn { table: String, column: String },
}

impl CompileIssue {
    fn to_error(&self) -> Error {
        match self {
            CompileIssue::UnknownTable(table) => Error::UnknownTable(table.clone()),
            CompileIssue::MissingColumn { table, column } => Error::MissingColumn {
                table: table.clone(),
                column: column.clone(),
            },
        }
    }
}

/// A projection type resolved to the columns it reads.
#[derive(Debug, Clone)]
pub struct CompiledProjection {
    projection: Arc<ProjectionType>,
    columns: Vec<String>,
    issues: Vec<CompileIssue>,
}

impl CompiledProjection {
    /// Compile a projection against the current table schemas.
    ///
    /// Reads the scalar columns and the foreign-key columns of its relations.
    /// Columns or tables the store does not have are recorded as issues
    /// instead of failing, so one bad projection cannot block a context.
    pub fn compile(storage: &StorageEngine, projection: &Arc<ProjectionType>) -> Result<Self, Error> {
        let template = projection.template();
        let mut columns = Vec::new();
        let mut issues = Vec::new();

        let schema = lookup_schema(storage, &template.table, &mut issues)?;

        for field in projection.fields() {
            match &field.kind {
                ProjectedKind::Scalar(_) => {
                    require_column(&template.table, schema.as_deref(), &field.column, &mut issues);
                    push_unique(&mut columns, &field.column);
                }
                ProjectedKind::Relation { relation, target } => match &relation.mapping {
                    RelationMapping::ForeignKey { column } => {
                        require_column(&template.table, schema.as_deref(), column, &mut issues);
                        push_unique(&mut columns, column);
                    }
                    RelationMapping::MappedBy { column } => {
                        let table = &target.template().table;
                        let target_schema = lookup_schema(storage, table, &mut issues)?;
                        require_column(table, target_schema.as_deref(), column, &mut issues);
                    }
                    RelationMapping::LinkTable { table, .. } => {
                        match lookup_schema(storage, table, &mut issues)?.as_deref() {
                            Some(TableSchema::Links { .. }) | None => {}
                            Some(TableSchema::Rows { .. }) => {
                                issues.push(CompileIssue::UnknownTable(table.clone()))
                            }
                        }
                    }
                },
            }
        }

        Ok(Self {
            projection: projection.clone(),
            columns,
            issues,
        })
    }

    pub fn projection(&self) -> &Arc<ProjectionType> {
        &self.projection
    }

    pub fn shape(&self) -> &ShapeId {
        self.projection.shape()
    }

    /// Table the projection reads from.
    pub fn table(&self) -> &str {
        &self.projection.template().table
    }

    /// Columns decoded from each row.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of `column` in [`columns`](Self::columns).
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn issues(&self) -> &[CompileIssue] {
        &self.issues
    }

    /// Fail with the first recorded issue.
    pub fn check(&self) -> Result<(), Error> {
        match self.issues.first() {
            Some(issue) => Err(issue.to_error()),
            None => Ok(()),
        }
    }
}

fn lookup_schema(
    storage: &StorageEngine,
    table: &str,
    issues: &mut Vec<CompileIssue>,
) -> Result<Option<Arc<TableSchema>>, Error> {
    match storage.table_schema(table) {
        Ok(schema) => Ok(Some(schema)),
        Err(Error::UnknownTable(name)) => {
            let issue = CompileIssue::UnknownTable(name);
            if !issues.contains(&issue) {
                issues.push(issue);
            }
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn require_column(
    table: &str,
    schema: Option<&TableSchema>,
    column: &str,
    issues: &mut Vec<CompileIssue>,
) {
    if let Some(schema) = schema {
        if !schema.has_column(column) {
            issues.push(CompileIssue::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
}

fn push_unique(columns: &mut Vec<String>, column: &str) {
    if !columns.iter().any(|c| c == column) {
        columns.push(column.to_string());
    }
}
