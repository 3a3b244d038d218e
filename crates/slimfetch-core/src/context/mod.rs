//! Execution contexts and their lifecycle.
//!
//! A context is bound to the projection types it was compiled for. The
//! [`ContextManager`] keeps exactly one current context, replaces it when a
//! new type is registered, and retires the old one after a grace delay.

mod compiled;
mod execution;
mod factory;
mod manager;
mod retirement;

pub use compiled::{CompileIssue, CompiledProjection};
pub use execution::{ContextLease, ContextState, ExecutionContext};
pub use factory::{ContextFactory, StorageContextFactory};
pub use manager::{ContextManager, ContextStats};
pub use retirement::RetirementWorker;
