//! Fetch plans: the joins needed to load a selection in one pass.

use std::collections::HashMap;
use std::fmt;

use slimfetch_proto::SelectionSet;

/// One join of a fetch plan: load `field` of the rows bound to
/// `parent_alias` and bind the related rows to `alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinInstruction {
    pub parent_alias: String,
    pub field: String,
    pub alias: String,
}

impl fmt::Display for JoinInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "left join fetch {}.{} {}", self.parent_alias, self.field, self.alias)
    }
}

/// Ordered join instructions for a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    root_alias: String,
    joins: Vec<JoinInstruction>,
}

/// Alias of the root rows: the template name's first character, lower-cased.
pub fn root_alias(template: &str) -> String {
    alias_prefix(template)
}

fn alias_prefix(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_lowercase().collect())
        .unwrap_or_else(|| "x".to_string())
}

/// Build the fetch plan for a selection.
///
/// Walks the selection depth-first in request order. Every relation with a
/// child selection gets an alias made of its first character, lower-cased,
/// and a counter kept per prefix starting at 0; leaves and relations
/// without children produce no join.
pub fn build_plan(root_alias: impl Into<String>, selection: &SelectionSet) -> FetchPlan {
    let mut plan = FetchPlan {
        root_alias: root_alias.into(),
        joins: Vec::new(),
    };
    let mut counters = HashMap::new();
    let root = plan.root_alias.clone();
    collect_joins(&root, selection, &mut counters, &mut plan.joins);
    plan
}

fn collect_joins(
    parent: &str,
    selection: &SelectionSet,
    counters: &mut HashMap<String, u32>,
    joins: &mut Vec<JoinInstruction>,
) {
    for field in selection {
        if field.is_leaf() {
            continue;
        }

        let prefix = alias_prefix(field.name());
        let counter = counters.entry(prefix.clone()).or_insert(0);
        let alias = format!("{}{}", prefix, counter);
        *counter += 1;

        joins.push(JoinInstruction {
            parent_alias: parent.to_string(),
            field: field.name().to_string(),
            alias: alias.clone(),
        });
        collect_joins(&alias, field.selection(), counters, joins);
    }
}

impl FetchPlan {
    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    pub fn joins(&self) -> &[JoinInstruction] {
        &self.joins
    }

    /// Find the join that binds `alias`.
    pub fn join_for(&self, alias: &str) -> Option<&JoinInstruction> {
        self.joins.iter().find(|j| j.alias == alias)
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}

impl fmt::Display for FetchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, join) in self.joins.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", join)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn join(parent: &str, field: &str, alias: &str) -> JoinInstruction {
        JoinInstruction {
            parent_alias: parent.into(),
            field: field.into(),
            alias: alias.into(),
        }
    }

    #[test]
    fn test_root_alias() {
        assert_eq!(root_alias("Book"), "b");
        assert_eq!(root_alias("Person"), "p");
    }

    #[test]
    fn test_book_plan() {
        let selection = SelectionSet::new()
            .field("title")
            .relation(
                "author",
                SelectionSet::new().field("name").relation(
                    "addresses",
                    SelectionSet::new().relation("country", SelectionSet::new().field("name")),
                ),
            )
            .relation("quotes", SelectionSet::new().field("text"))
            .relation("reviewers", SelectionSet::new().field("name"));

        let plan = build_plan(root_alias("Book"), &selection);
        assert_eq!(
            plan.joins(),
            [
                join("b", "author", "a0"),
                join("a0", "addresses", "a1"),
                join("a1", "country", "c0"),
                join("b", "quotes", "q0"),
                join("b", "reviewers", "r0"),
            ]
        );
        assert_eq!(
            plan.to_string(),
            "left join fetch b.author a0 left join fetch a0.addresses a1 \
             left join fetch a1.country c0 left join fetch b.quotes q0 \
             left join fetch b.reviewers r0"
        );
    }

    #[test]
    fn test_leaves_and_empty_relations_emit_nothing() {
        let selection = SelectionSet::new().field("id").field("author");
        assert!(build_plan("b", &selection).is_empty());
    }

    #[test]
    fn test_aliases_unique_and_stable() {
        let selection = SelectionSet::new()
            .relation("bar", SelectionSet::new().relation("baz", SelectionSet::new().field("x")))
            .relation("Bob", SelectionSet::new().field("y"));

        let first = build_plan("b", &selection);
        let second = build_plan("b", &selection);
        assert_eq!(first, second);

        let aliases: HashSet<_> = first.joins().iter().map(|j| j.alias.as_str()).collect();
        assert_eq!(aliases.len(), first.len());
        assert!(!aliases.contains("b"));
        assert_eq!(first.join_for("b2").map(|j| j.field.as_str()), Some("Bob"));
    }
}
