//! slimfetch core - projection-driven entity fetching.
//!
//! Callers name a template, a selection of its fields and the keys to load.
//! The resolver builds (or reuses) a projection type for the selection's
//! shape, makes sure the current execution context knows it, and runs a
//! single fetch joining every selected relation.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod projection;
pub mod query;
pub mod resolver;
pub mod storage;

pub use catalog::{
    Cardinality, EntityTemplate, FieldDef, FieldKind, RelationDef, RelationMapping, ScalarType,
    TemplateRegistry, TemplateRegistryBuilder,
};
pub use config::{ContextConfig, DrainPolicy, ResolverConfig};
pub use context::{ContextManager, ContextStats, ExecutionContext};
pub use error::Error;
pub use projection::{CacheStats, ProjectionCache, ProjectionType, ShapeId};
pub use query::{FetchPlan, FetchQuery};
pub use resolver::Resolver;
pub use storage::{Record, StorageConfig, StorageEngine};

/// Re-export protocol types.
pub use slimfetch_proto as proto;
