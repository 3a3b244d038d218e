//! Entry point: resolve selections of a template by key.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use slimfetch_proto::{ProjectedRecord, SelectionSet, Value};

use crate::catalog::TemplateRegistry;
use crate::config::ResolverConfig;
use crate::context::{ContextFactory, ContextManager, StorageContextFactory};
use crate::error::Error;
use crate::projection::{ProjectionCache, ProjectionType};
use crate::query::{build_plan, root_alias, FetchPlan, FetchQuery};
use crate::storage::key::encode_key;
use crate::storage::StorageEngine;

/// Resolves `(template, selection, keys)` requests into projected records.
///
/// Projection types are cached per shape; contexts are rebuilt as new
/// shapes appear and the previous context retires in the background.
pub struct Resolver {
    cache: ProjectionCache,
    contexts: Arc<ContextManager>,
}

impl Resolver {
    /// Create a resolver reading from `storage`.
    pub fn new(
        registry: Arc<TemplateRegistry>,
        storage: Arc<StorageEngine>,
        config: ResolverConfig,
    ) -> Result<Self, Error> {
        Self::with_factory(registry, Arc::new(StorageContextFactory::new(storage)), config)
    }

    /// Create a resolver with a custom context factory.
    pub fn with_factory(
        registry: Arc<TemplateRegistry>,
        factory: Arc<dyn ContextFactory>,
        config: ResolverConfig,
    ) -> Result<Self, Error> {
        let contexts = Arc::new(ContextManager::new(config.context, factory)?);
        let cache = ProjectionCache::new(registry).with_listener(contexts.clone());
        Ok(Self { cache, contexts })
    }

    /// Resolve one key. Returns `Ok(None)` when no row has the key.
    pub fn resolve(
        &self,
        template: &str,
        selection: &SelectionSet,
        key: impl Into<Value>,
    ) -> Result<Option<ProjectedRecord>, Error> {
        let mut records = self.resolve_many(template, selection, &[key.into()])?;
        Ok(records.pop())
    }

    /// Resolve several keys. Records come back in key order; missing and
    /// repeated keys are skipped.
    pub fn resolve_many(
        &self,
        template: &str,
        selection: &SelectionSet,
        keys: &[Value],
    ) -> Result<Vec<ProjectedRecord>, Error> {
        let ty = self.projection(template, selection)?;
        let keys = coerce_keys(&ty, keys)?;
        let query = FetchQuery::new(ty.clone(), self.plan(template, selection), keys);

        let context = self.contexts.context_for(&ty)?;
        let lease = context.lease()?;
        debug!(
            projection = ty.name(),
            generation = lease.generation(),
            "resolving"
        );
        lease.execute(&query)
    }

    /// Projection type for a selection, built on first use.
    pub fn projection(
        &self,
        template: &str,
        selection: &SelectionSet,
    ) -> Result<Arc<ProjectionType>, Error> {
        self.cache.get_or_build(template, selection)
    }

    /// Fetch plan for a selection.
    pub fn plan(&self, template: &str, selection: &SelectionSet) -> FetchPlan {
        build_plan(root_alias(template), selection)
    }

    pub fn cache(&self) -> &ProjectionCache {
        &self.cache
    }

    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        self.cache.registry()
    }

    /// Close every retired context and stop the retirement worker.
    pub fn shutdown(&self) {
        self.contexts.shutdown();
    }
}

fn coerce_keys(ty: &ProjectionType, keys: &[Value]) -> Result<Vec<Value>, Error> {
    let template = ty.template();
    let identity = template.identity_type().ok_or_else(|| {
        Error::InvalidData(format!("template '{}' has no identity field", template.name))
    })?;

    let mut seen = HashSet::new();
    let mut coerced = Vec::with_capacity(keys.len());
    for key in keys {
        let key = identity.coerce_key(key)?;
        if seen.insert(encode_key(&key)?) {
            coerced.push(key);
        }
    }
    Ok(coerced)
}
