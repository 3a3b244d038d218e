//! Canonical shape identifiers.
//!
//! An identifier renders a selection as `Template[tok1,tok2,...]` with the
//! tokens sorted, so two selections naming the same fields in a different
//! order map to the same identifier. A relation with a child selection
//! contributes `name[...]`, built the same way.
//!
//! The *shallow* identifier uses only what the caller selected. The *full*
//! identifier also adds every mandatory field, at every level, and is the
//! one a projection type is built for.

use std::fmt;

use slimfetch_proto::SelectionSet;

use crate::catalog::{EntityTemplate, FieldKind, TemplateRegistry};
use crate::error::Error;

/// Canonical identifier of a (template, selection) shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(String);

impl ShapeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Template name the shape belongs to.
    pub fn template(&self) -> &str {
        self.0.split('[').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShapeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Characters that structure an identifier and so cannot appear in a name.
const DELIMITERS: [char; 3] = [',', '[', ']'];

/// Reject field names that are empty or contain identifier delimiters.
///
/// Run before any identifier of the selection is used as a cache key, so a
/// name like `"id,title"` cannot collide with the shape `[id,title]`.
pub fn check_names(template: &str, selection: &SelectionSet) -> Result<(), Error> {
    for field in selection {
        let path = format!("{}.{}", template, field.name());
        if field.name().is_empty() {
            return Err(Error::InvalidSelection {
                path,
                reason: "empty field name".into(),
            });
        }
        if field.name().contains(DELIMITERS) {
            return Err(Error::InvalidSelection {
                path,
                reason: "field name contains ',', '[' or ']'".into(),
            });
        }
        check_names(&path, field.selection())?;
    }
    Ok(())
}

/// Identifier built from the explicit selection only.
///
/// Needs no catalog access; unknown fields simply become part of the id.
/// Names must have passed [`check_names`] for the id to be unambiguous.
pub fn shallow_id(template: &str, selection: &SelectionSet) -> ShapeId {
    ShapeId(format!("{}{}", template, shallow_tokens(selection)))
}

fn shallow_tokens(selection: &SelectionSet) -> String {
    let tokens = selection
        .iter()
        .map(|field| {
            if field.is_leaf() {
                field.name().to_string()
            } else {
                format!("{}{}", field.name(), shallow_tokens(field.selection()))
            }
        })
        .collect();
    bracket(tokens)
}

/// Identifier of the selection plus all mandatory fields, recursively.
///
/// Validates the selection against the catalog on the way: an unknown field
/// fails with `UnknownField`, a child selection under a scalar or an empty
/// field name with `InvalidSelection`, and a relation to an unregistered
/// template with `BuildFailure`.
pub fn full_id(
    registry: &TemplateRegistry,
    template: &EntityTemplate,
    selection: &SelectionSet,
) -> Result<ShapeId, Error> {
    check_names(&template.name, selection)?;
    let walk = FullWalk {
        registry,
        root: template,
        root_selection: selection,
    };
    let tokens = walk.tokens(template, selection, &template.name)?;
    Ok(ShapeId(format!("{}{}", template.name, tokens)))
}

struct FullWalk<'a> {
    registry: &'a TemplateRegistry,
    root: &'a EntityTemplate,
    root_selection: &'a SelectionSet,
}

impl FullWalk<'_> {
    fn tokens(
        &self,
        template: &EntityTemplate,
        selection: &SelectionSet,
        path: &str,
    ) -> Result<String, Error> {
        let mut tokens = Vec::with_capacity(selection.len() + 1);

        for selected in selection {
            let field_path = format!("{}.{}", path, selected.name());

            let field = template
                .get_field(selected.name())
                .ok_or_else(|| Error::UnknownField {
                    path: field_path.clone(),
                })?;

            match &field.kind {
                FieldKind::Scalar(_) if !selected.is_leaf() => {
                    return Err(Error::InvalidSelection {
                        path: field_path,
                        reason: "scalar field cannot have a child selection".into(),
                    });
                }
                FieldKind::Relation(rel) if !selected.is_leaf() => {
                    let target = self.registry.get(&rel.target).ok_or_else(|| {
                        Error::BuildFailure {
                            shape: shallow_id(&self.root.name, self.root_selection).to_string(),
                            reason: format!(
                                "relation '{}' targets unregistered template '{}'",
                                field_path, rel.target
                            ),
                        }
                    })?;
                    let child = self.tokens(target, selected.selection(), &field_path)?;
                    tokens.push(format!("{}{}", field.name, child));
                }
                _ => tokens.push(field.name.clone()),
            }
        }

        for field in template.mandatory_fields() {
            if !selection.contains(&field.name) {
                tokens.push(field.name.clone());
            }
        }

        Ok(bracket(tokens))
    }
}

fn bracket(mut tokens: Vec<String>) -> String {
    tokens.sort_unstable();
    format!("[{}]", tokens.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, RelationDef, ScalarType};
    use pretty_assertions::assert_eq;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::builder()
            .register(
                EntityTemplate::new("Book", "book", "id")
                    .with_field(FieldDef::scalar("id", ScalarType::Int32))
                    .with_field(FieldDef::scalar("title", ScalarType::String))
                    .with_field(FieldDef::relation(
                        "author",
                        RelationDef::many_to_one("Person", "author_id"),
                    ))
                    .with_field(FieldDef::relation(
                        "missingOneToMany",
                        RelationDef::one_to_many("Missing", "book_id"),
                    )),
            )
            .register(
                EntityTemplate::new("Person", "person", "id")
                    .with_field(FieldDef::scalar("id", ScalarType::Int64))
                    .with_field(FieldDef::scalar("name", ScalarType::String))
                    .with_field(FieldDef::scalar("email", ScalarType::String).mandatory()),
            )
            .build()
            .unwrap()
    }

    fn book_selection() -> SelectionSet {
        SelectionSet::new()
            .field("title")
            .relation("author", SelectionSet::new().field("name"))
    }

    #[test]
    fn test_shallow_id() {
        assert_eq!(
            shallow_id("Book", &book_selection()).as_str(),
            "Book[author[name],title]"
        );
        assert_eq!(shallow_id("Book", &SelectionSet::new()).as_str(), "Book[]");
    }

    #[test]
    fn test_identifiers_are_order_independent() {
        let reordered = SelectionSet::new()
            .relation("author", SelectionSet::new().field("name"))
            .field("title");
        assert_eq!(
            shallow_id("Book", &book_selection()),
            shallow_id("Book", &reordered)
        );

        let registry = registry();
        let book = registry.require("Book").unwrap();
        assert_eq!(
            full_id(&registry, book, &book_selection()).unwrap(),
            full_id(&registry, book, &reordered).unwrap()
        );
    }

    #[test]
    fn test_full_id_adds_mandatory_fields() {
        let registry = registry();
        let book = registry.require("Book").unwrap();

        let id = full_id(&registry, book, &book_selection()).unwrap();
        assert_eq!(id.as_str(), "Book[author[email,id,name],id,title]");
        assert_eq!(id.template(), "Book");

        let id = full_id(&registry, book, &SelectionSet::new().field("id")).unwrap();
        assert_eq!(id, shallow_id("Book", &SelectionSet::new().field("id")));
    }

    #[test]
    fn test_relation_without_children_is_a_plain_token() {
        let registry = registry();
        let book = registry.require("Book").unwrap();
        let selection = SelectionSet::new().field("author").field("missingOneToMany");

        let id = full_id(&registry, book, &selection).unwrap();
        assert_eq!(id.as_str(), "Book[author,id,missingOneToMany]");
    }

    #[test]
    fn test_unknown_field_path() {
        let registry = registry();
        let book = registry.require("Book").unwrap();
        let selection =
            SelectionSet::new().relation("author", SelectionSet::new().field("bogus"));

        let err = full_id(&registry, book, &selection).unwrap_err();
        assert!(matches!(err, Error::UnknownField { path } if path == "Book.author.bogus"));
    }

    #[test]
    fn test_scalar_with_children_rejected() {
        let registry = registry();
        let book = registry.require("Book").unwrap();
        let selection = SelectionSet::new().relation("title", SelectionSet::new().field("x"));

        let err = full_id(&registry, book, &selection).unwrap_err();
        assert!(matches!(err, Error::InvalidSelection { path, .. } if path == "Book.title"));
    }

    #[test]
    fn test_unregistered_target_is_build_failure() {
        let registry = registry();
        let book = registry.require("Book").unwrap();
        let selection =
            SelectionSet::new().relation("missingOneToMany", SelectionSet::new().field("id"));

        let err = full_id(&registry, book, &selection).unwrap_err();
        assert!(
            matches!(err, Error::BuildFailure { shape, .. } if shape == "Book[missingOneToMany[id]]")
        );
    }

    #[test]
    fn test_delimiter_in_name_rejected() {
        let registry = registry();
        let book = registry.require("Book").unwrap();

        for selection in [
            SelectionSet::new().field("id,title"),
            SelectionSet::new().relation("author", SelectionSet::new().field("name]")),
            SelectionSet::new().field(""),
        ] {
            let err = full_id(&registry, book, &selection).unwrap_err();
            assert!(matches!(err, Error::InvalidSelection { .. }), "{:?}", err);
        }

        let err = check_names("Book", &SelectionSet::new().relation(
            "author",
            SelectionSet::new().field("[x"),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection { path, .. } if path == "Book.author.[x"));
    }
}
