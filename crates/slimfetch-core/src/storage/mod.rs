//! Storage layer.
//!
//! A sled-based row store: one tree per table, rows encoded with a compact
//! tagged codec so projections can decode only the columns they need.

mod config;
mod engine;
mod record;

pub mod codec;
pub mod key;

pub use config::StorageConfig;
pub use engine::{StorageEngine, TableSchema};
pub use record::Record;
