//! Frozen registry of entity templates.

use super::field::FieldKind;
use super::template::EntityTemplate;
use crate::error::Error;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// All templates known to the process. Built once at startup and never changed.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Arc<EntityTemplate>>,
}

/// Collects templates and validates them into a [`TemplateRegistry`].
#[derive(Debug, Default)]
pub struct TemplateRegistryBuilder {
    templates: Vec<EntityTemplate>,
}

impl TemplateRegistry {
    pub fn builder() -> TemplateRegistryBuilder {
        TemplateRegistryBuilder::default()
    }

    /// Get a template by name.
    pub fn get(&self, name: &str) -> Option<&Arc<EntityTemplate>> {
        self.templates.get(name)
    }

    /// Get a template by name, failing with `UnknownTemplate`.
    pub fn require(&self, name: &str) -> Result<&Arc<EntityTemplate>, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnknownTemplate(name.to_string()))
    }

    /// Registered template names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateRegistryBuilder {
    /// Add a template.
    pub fn register(mut self, template: EntityTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Validate and freeze the registry.
    ///
    /// Rejects duplicate template or field names, a missing or non-scalar
    /// identity field, identity types that cannot be keys, and mandatory
    /// relations. Relations to unregistered templates are accepted with a
    /// warning; selecting them fails later.
    pub fn build(self) -> Result<TemplateRegistry, Error> {
        let mut templates = HashMap::with_capacity(self.templates.len());

        for template in self.templates {
            validate_template(&template)?;
            let name = template.name.clone();
            if templates.insert(name.clone(), Arc::new(template)).is_some() {
                return Err(Error::InvalidData(format!(
                    "template '{}' registered twice",
                    name
                )));
            }
        }

        for template in templates.values() {
            for field in &template.fields {
                if let FieldKind::Relation(rel) = &field.kind {
                    if !templates.contains_key(&rel.target) {
                        warn!(
                            template = %template.name,
                            field = %field.name,
                            target = %rel.target,
                            "relation target is not a registered template"
                        );
                    }
                }
            }
        }

        info!(templates = templates.len(), "template registry built");
        Ok(TemplateRegistry { templates })
    }
}

fn validate_template(template: &EntityTemplate) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for field in &template.fields {
        if field.name.is_empty() {
            return Err(Error::InvalidData(format!(
                "template '{}' has a field with an empty name",
                template.name
            )));
        }
        if field.name.contains([',', '[', ']']) {
            return Err(Error::InvalidData(format!(
                "field name '{}.{}' contains ',', '[' or ']'",
                template.name, field.name
            )));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(Error::InvalidData(format!(
                "field '{}' declared twice on template '{}'",
                field.name, template.name
            )));
        }
        if field.mandatory && field.is_relation() {
            return Err(Error::InvalidData(format!(
                "relation '{}.{}' cannot be mandatory",
                template.name, field.name
            )));
        }
    }

    let identity = template.get_identity_field().ok_or_else(|| {
        Error::InvalidData(format!(
            "identity field '{}' missing on template '{}'",
            template.identity_field, template.name
        ))
    })?;
    match identity.scalar_type() {
        Some(ty) if ty.is_key_type() => Ok(()),
        _ => Err(Error::InvalidData(format!(
            "identity field '{}.{}' must be a scalar key type",
            template.name, identity.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, RelationDef, ScalarType};

    fn person() -> EntityTemplate {
        EntityTemplate::new("Person", "person", "id")
            .with_field(FieldDef::scalar("id", ScalarType::Int64))
            .with_field(FieldDef::scalar("name", ScalarType::String))
    }

    #[test]
    fn test_build_registry() {
        let registry = TemplateRegistry::builder()
            .register(person())
            .register(
                EntityTemplate::new("Book", "book", "id")
                    .with_field(FieldDef::scalar("id", ScalarType::Int32))
                    .with_field(FieldDef::relation(
                        "author",
                        RelationDef::many_to_one("Person", "author_id"),
                    )),
            )
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Book", "Person"]);
        assert!(registry.require("Book").is_ok());
        assert!(matches!(
            registry.require("Nope"),
            Err(Error::UnknownTemplate(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_duplicate_template() {
        let result = TemplateRegistry::builder()
            .register(person())
            .register(person())
            .build();
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_duplicate_field() {
        let result = TemplateRegistry::builder()
            .register(person().with_field(FieldDef::scalar("name", ScalarType::String)))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_delimiter_in_field_name_rejected() {
        let result = TemplateRegistry::builder()
            .register(person().with_field(FieldDef::scalar("first,last", ScalarType::String)))
            .build();
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_missing_identity() {
        let result = TemplateRegistry::builder()
            .register(
                EntityTemplate::new("Tag", "tag", "id")
                    .with_field(FieldDef::scalar("label", ScalarType::String)),
            )
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_float_identity_rejected() {
        let result = TemplateRegistry::builder()
            .register(
                EntityTemplate::new("Point", "point", "x")
                    .with_field(FieldDef::scalar("x", ScalarType::Float64)),
            )
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_mandatory_relation_rejected() {
        let result = TemplateRegistry::builder()
            .register(person().with_field(
                FieldDef::relation("friend", RelationDef::many_to_one("Person", "friend_id"))
                    .mandatory(),
            ))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unregistered_target_allowed() {
        let registry = TemplateRegistry::builder()
            .register(person().with_field(FieldDef::relation(
                "pets",
                RelationDef::one_to_many("Pet", "owner_id"),
            )))
            .build()
            .unwrap();
        assert!(registry.get("Pet").is_none());
    }
}
