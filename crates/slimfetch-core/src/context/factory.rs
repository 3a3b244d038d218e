//! Creation of execution contexts.

use std::sync::Arc;

use super::compiled::CompiledProjection;
use super::execution::ExecutionContext;
use crate::error::Error;
use crate::projection::ProjectionType;
use crate::storage::StorageEngine;

/// Creates execution contexts for a fixed set of projection types.
pub trait ContextFactory: Send + Sync {
    fn create(
        &self,
        generation: u64,
        types: &[Arc<ProjectionType>],
    ) -> Result<ExecutionContext, Error>;
}

/// Compiles every type against the storage engine's table schemas.
pub struct StorageContextFactory {
    storage: Arc<StorageEngine>,
}

impl StorageContextFactory {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }
}

impl ContextFactory for StorageContextFactory {
    fn create(
        &self,
        generation: u64,
        types: &[Arc<ProjectionType>],
    ) -> Result<ExecutionContext, Error> {
        let compiled = types
            .iter()
            .map(|ty| CompiledProjection::compile(&self.storage, ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExecutionContext::new(generation, self.storage.clone(), compiled))
    }
}
