//! Fetch planning and execution.
//!
//! A selection becomes a [`FetchPlan`] of join instructions, which a
//! [`FetchQuery`] pairs with a projection type and a list of keys. The
//! [`FetchExecutor`] runs the query inside an execution context.

mod executor;
mod join;
mod plan;
mod rows;
mod statement;

pub use executor::FetchExecutor;
pub use plan::{build_plan, root_alias, FetchPlan, JoinInstruction};
pub use statement::FetchQuery;
