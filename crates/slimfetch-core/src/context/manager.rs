//! Ownership of the current execution context.
//!
//! The manager keeps the set of registered projection types and one current
//! context compiled for (a superset of) that set. Registering a type the
//! current context does not know triggers a rebuild: a new context is
//! created for the whole set, swapped in as current, and the old one is
//! handed to the retirement worker. Rebuilds are serialized by their own
//! mutex; readers only clone an `Arc` under a read lock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, instrument, warn};

use super::execution::ExecutionContext;
use super::factory::ContextFactory;
use super::retirement::RetirementWorker;
use crate::config::ContextConfig;
use crate::error::Error;
use crate::projection::{ProjectionListener, ProjectionType, ShapeId};

/// Context manager statistics.
#[derive(Debug, Default)]
pub struct ContextStats {
    contexts_created: AtomicU64,
    rebuilds: AtomicU64,
    rebuild_failures: AtomicU64,
    closed: AtomicU64,
}

impl ContextStats {
    /// Contexts created, the initial one included.
    pub fn contexts_created(&self) -> u64 {
        self.contexts_created.load(Ordering::Relaxed)
    }

    /// Contexts created because a new type was registered.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    /// Context creations that failed.
    pub fn rebuild_failures(&self) -> u64 {
        self.rebuild_failures.load(Ordering::Relaxed)
    }

    /// Retired contexts that have been closed.
    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }

    pub(crate) fn record_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct RegisteredTypes {
    types: Vec<Arc<ProjectionType>>,
    shapes: HashSet<ShapeId>,
}

impl RegisteredTypes {
    fn add(&mut self, ty: &Arc<ProjectionType>) -> usize {
        let mut added = 0;
        for t in ty.with_nested() {
            if self.shapes.insert(t.shape().clone()) {
                self.types.push(t);
                added += 1;
            }
        }
        added
    }
}

/// Owns the current execution context and rebuilds it when needed.
pub struct ContextManager {
    factory: Arc<dyn ContextFactory>,
    current: RwLock<Arc<ExecutionContext>>,
    /// Registered types; holding this lock is what serializes rebuilds.
    registered: Mutex<RegisteredTypes>,
    next_generation: AtomicU64,
    retirement: RetirementWorker,
    stats: Arc<ContextStats>,
}

impl ContextManager {
    /// Create the manager and its first, empty context.
    pub fn new(config: ContextConfig, factory: Arc<dyn ContextFactory>) -> Result<Self, Error> {
        let initial = factory
            .create(0, &[])
            .map_err(|e| Error::ContextRebuild {
                generation: 0,
                reason: e.to_string(),
            })?;
        initial.mark_current();
        info!(generation = 0, "execution context installed");

        let stats = Arc::new(ContextStats::default());
        stats.contexts_created.fetch_add(1, Ordering::Relaxed);

        Ok(Self {
            factory,
            current: RwLock::new(Arc::new(initial)),
            registered: Mutex::new(RegisteredTypes::default()),
            next_generation: AtomicU64::new(1),
            retirement: RetirementWorker::start(config, stats.clone()),
            stats,
        })
    }

    /// The most recently installed context.
    pub fn current_context(&self) -> Arc<ExecutionContext> {
        self.current.read().clone()
    }

    /// Register a type and its nested types, rebuilding if the current
    /// context does not know all registered types.
    ///
    /// A failed rebuild leaves the previous context current and keeps the
    /// registration, so a later rebuild picks the types up.
    pub fn register_type(&self, ty: &Arc<ProjectionType>) -> Result<(), Error> {
        let mut registered = self.registered.lock();
        registered.add(ty);

        let current = self.current_context();
        if registered.types.iter().all(|t| current.knows(t.shape())) {
            return Ok(());
        }

        self.rebuild(&registered)?;
        self.stats.rebuilds.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// A context that knows `ty`, registering it first if needed.
    pub fn context_for(&self, ty: &Arc<ProjectionType>) -> Result<Arc<ExecutionContext>, Error> {
        let current = self.current_context();
        if current.knows_all(ty) {
            return Ok(current);
        }

        self.register_type(ty)?;
        let current = self.current_context();
        if current.knows_all(ty) {
            Ok(current)
        } else {
            Err(Error::UnregisteredProjection {
                shape: ty.shape().to_string(),
                generation: current.generation(),
            })
        }
    }

    /// Number of registered projection types.
    pub fn registered_count(&self) -> usize {
        self.registered.lock().types.len()
    }

    /// Number of retired contexts not yet closed.
    pub fn retiring_count(&self) -> usize {
        self.retirement.pending()
    }

    pub fn stats(&self) -> &ContextStats {
        &self.stats
    }

    /// Stop the retirement worker, closing every retired context.
    pub fn shutdown(&self) {
        self.retirement.stop();
    }

    #[instrument(skip_all, fields(types = registered.types.len()))]
    fn rebuild(&self, registered: &RegisteredTypes) -> Result<Arc<ExecutionContext>, Error> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);

        let context = match self.factory.create(generation, &registered.types) {
            Ok(context) => Arc::new(context),
            Err(e) => {
                self.stats.rebuild_failures.fetch_add(1, Ordering::Relaxed);
                warn!(generation, error = %e, "execution context rebuild failed");
                return Err(Error::ContextRebuild {
                    generation,
                    reason: e.to_string(),
                });
            }
        };

        context.mark_current();
        let previous = std::mem::replace(&mut *self.current.write(), context.clone());
        self.stats.contexts_created.fetch_add(1, Ordering::Relaxed);
        info!(
            generation,
            projections = context.projection_count(),
            "execution context installed"
        );

        previous.mark_retiring();
        self.retirement.retire(previous);

        Ok(context)
    }
}

impl ProjectionListener for ContextManager {
    fn on_new_type(&self, ty: &Arc<ProjectionType>) -> Result<(), Error> {
        self.register_type(ty)
    }
}
