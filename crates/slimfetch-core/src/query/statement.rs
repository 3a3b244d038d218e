//! Fetch statements executed by an execution context.

use std::fmt;
use std::sync::Arc;

use slimfetch_proto::Value;

use super::plan::FetchPlan;
use crate::projection::ProjectionType;

/// Select the rows of a projection by identity, joining along a fetch plan.
#[derive(Debug, Clone)]
pub struct FetchQuery {
    projection: Arc<ProjectionType>,
    plan: FetchPlan,
    keys: Vec<Value>,
}

impl FetchQuery {
    pub fn new(projection: Arc<ProjectionType>, plan: FetchPlan, keys: Vec<Value>) -> Self {
        Self {
            projection,
            plan,
            keys,
        }
    }

    pub fn projection(&self) -> &Arc<ProjectionType> {
        &self.projection
    }

    pub fn plan(&self) -> &FetchPlan {
        &self.plan
    }

    pub fn keys(&self) -> &[Value] {
        &self.keys
    }

    /// Statement text, e.g.
    /// `select b from Book$proj0 b left join fetch b.author a0 where b.id in (:keys)`.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FetchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alias = self.plan.root_alias();
        write!(f, "select {} from {} {}", alias, self.projection.name(), alias)?;
        for join in self.plan.joins() {
            write!(f, " {}", join)?;
        }
        write!(
            f,
            " where {}.{} in (:keys)",
            alias,
            self.projection.template().identity_field
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityTemplate, FieldDef, RelationDef, ScalarType, TemplateRegistry};
    use crate::projection::ProjectionCache;
    use crate::query::plan::{build_plan, root_alias};
    use slimfetch_proto::SelectionSet;

    #[test]
    fn test_render() {
        let registry = TemplateRegistry::builder()
            .register(
                EntityTemplate::new("Book", "book", "id")
                    .with_field(FieldDef::scalar("id", ScalarType::Int32))
                    .with_field(FieldDef::relation(
                        "author",
                        RelationDef::many_to_one("Person", "author_id"),
                    )),
            )
            .register(
                EntityTemplate::new("Person", "person", "id")
                    .with_field(FieldDef::scalar("id", ScalarType::Int64))
                    .with_field(FieldDef::scalar("name", ScalarType::String)),
            )
            .build()
            .unwrap();
        let cache = ProjectionCache::new(Arc::new(registry));
        let selection = SelectionSet::new().relation("author", SelectionSet::new().field("name"));
        let ty = cache.get_or_build("Book", &selection).unwrap();

        let query = FetchQuery::new(ty, build_plan(root_alias("Book"), &selection), vec![Value::Int32(1)]);
        assert_eq!(
            query.render(),
            "select b from Book$proj0 b left join fetch b.author a0 where b.id in (:keys)"
        );
        assert_eq!(query.keys(), [Value::Int32(1)]);
    }
}
