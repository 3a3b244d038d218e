//! Selection-driven projection types.
//!
//! A projection type is the minimal view of a template needed to answer one
//! selection. Types are derived once per canonical shape and shared.

mod builder;
mod cache;
mod locks;
mod shape;
mod types;

pub use cache::{CacheStats, ProjectionCache, ProjectionListener};
pub use locks::KeyedLocks;
pub use shape::{check_names, full_id, shallow_id, ShapeId};
pub use types::{ProjectedField, ProjectedKind, ProjectionType};
