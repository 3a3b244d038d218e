//! Template catalog.
//!
//! Templates describe the entities a selection can address: their backing
//! table, identity field, scalar columns and relations.

mod field;
mod registry;
mod relation;
mod template;
mod types;

pub use field::{FieldDef, FieldKind};
pub use registry::{TemplateRegistry, TemplateRegistryBuilder};
pub use relation::{Cardinality, RelationDef, RelationMapping};
pub use template::EntityTemplate;
pub use types::ScalarType;
