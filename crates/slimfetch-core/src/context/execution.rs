//! Execution contexts.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use slimfetch_proto::ProjectedRecord;

use super::compiled::CompiledProjection;
use crate::error::Error;
use crate::projection::{ProjectionType, ShapeId};
use crate::query::{FetchExecutor, FetchQuery};
use crate::storage::StorageEngine;

/// Lifecycle state of an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    /// Being compiled; not yet visible to queries.
    Building = 0,
    /// The context handed out by the manager.
    Current = 1,
    /// Superseded; still usable until the grace delay ends.
    Retiring = 2,
    /// Closed; queries fail with `StaleContext`.
    Closed = 3,
}

impl ContextState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ContextState::Building,
            1 => ContextState::Current,
            2 => ContextState::Retiring,
            _ => ContextState::Closed,
        }
    }
}

/// A query environment bound to a fixed set of projection types.
///
/// The set is decided when the context is created; a type registered later
/// needs a new context.
pub struct ExecutionContext {
    generation: u64,
    state: AtomicU8,
    projections: HashMap<ShapeId, CompiledProjection>,
    storage: Arc<StorageEngine>,
    in_flight: AtomicUsize,
    created_at: Instant,
    retired_at: Mutex<Option<Instant>>,
    closed_at: Mutex<Option<Instant>>,
}

impl ExecutionContext {
    pub fn new(
        generation: u64,
        storage: Arc<StorageEngine>,
        projections: impl IntoIterator<Item = CompiledProjection>,
    ) -> Self {
        Self {
            generation,
            state: AtomicU8::new(ContextState::Building as u8),
            projections: projections
                .into_iter()
                .map(|p| (p.shape().clone(), p))
                .collect(),
            storage,
            in_flight: AtomicUsize::new(0),
            created_at: Instant::now(),
            retired_at: Mutex::new(None),
            closed_at: Mutex::new(None),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ContextState {
        ContextState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ContextState::Closed
    }

    /// Whether the context was compiled with this shape.
    pub fn knows(&self, shape: &ShapeId) -> bool {
        self.projections.contains_key(shape)
    }

    /// Whether the context knows a type and every type nested in it.
    pub fn knows_all(&self, ty: &Arc<ProjectionType>) -> bool {
        ty.with_nested().iter().all(|t| self.knows(t.shape()))
    }

    /// Number of projection types compiled into the context.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Compiled form of a projection.
    pub fn compiled(&self, shape: &ShapeId) -> Result<&CompiledProjection, Error> {
        self.projections
            .get(shape)
            .ok_or_else(|| Error::UnregisteredProjection {
                shape: shape.to_string(),
                generation: self.generation,
            })
    }

    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// Fail with `StaleContext` once the context is closed.
    pub fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::StaleContext {
                generation: self.generation,
            });
        }
        Ok(())
    }

    /// Take a lease for one query. Fails if the context is already closed.
    pub fn lease(self: &Arc<Self>) -> Result<ContextLease, Error> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let lease = ContextLease {
            context: self.clone(),
        };
        lease.ensure_open()?;
        Ok(lease)
    }

    /// Number of outstanding leases.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run a fetch query.
    pub fn execute(&self, query: &FetchQuery) -> Result<Vec<ProjectedRecord>, Error> {
        FetchExecutor::new(self).execute(query)
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn retired_at(&self) -> Option<Instant> {
        *self.retired_at.lock()
    }

    pub fn closed_at(&self) -> Option<Instant> {
        *self.closed_at.lock()
    }

    pub(crate) fn mark_current(&self) {
        self.state
            .store(ContextState::Current as u8, Ordering::SeqCst);
    }

    pub(crate) fn mark_retiring(&self) {
        *self.retired_at.lock() = Some(Instant::now());
        self.state
            .store(ContextState::Retiring as u8, Ordering::SeqCst);
    }

    pub(crate) fn close(&self) {
        let mut closed_at = self.closed_at.lock();
        if closed_at.is_none() {
            *closed_at = Some(Instant::now());
            self.state.store(ContextState::Closed as u8, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("generation", &self.generation)
            .field("state", &self.state())
            .field("projections", &self.projections.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Marks one query as running against a context.
///
/// Dropping the lease ends the query.
#[derive(Debug)]
pub struct ContextLease {
    context: Arc<ExecutionContext>,
}

impl ContextLease {
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.context
    }
}

impl Deref for ContextLease {
    type Target = ExecutionContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        self.context.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
