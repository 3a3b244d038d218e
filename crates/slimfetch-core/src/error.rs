//! Core error types.

use thiserror::Error;

/// Errors raised while resolving selections against the store.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error, or a key value that does not fit the identity type.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// No template is registered under this name.
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    /// A selected field does not exist on its template.
    #[error("unknown field '{path}'")]
    UnknownField { path: String },

    /// A selection is malformed at the given path.
    #[error("invalid selection at '{path}': {reason}")]
    InvalidSelection { path: String, reason: String },

    /// A projection type could not be built. Nothing was cached.
    #[error("failed to build projection for {shape}: {reason}")]
    BuildFailure { shape: String, reason: String },

    /// Creating a new execution context failed; the previous one stays current.
    #[error("failed to build execution context generation {generation}: {reason}")]
    ContextRebuild { generation: u64, reason: String },

    /// The execution context was closed while the query was running.
    #[error("execution context generation {generation} was closed")]
    StaleContext { generation: u64 },

    /// The execution context does not know the projection type.
    #[error("projection {shape} is not registered in context generation {generation}")]
    UnregisteredProjection { shape: String, generation: u64 },

    /// No table with this name exists in the store.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// A projected column is not part of the table schema.
    #[error("column '{column}' does not exist in table '{table}'")]
    MissingColumn { table: String, column: String },
}

impl Error {
    /// Whether repeating the same call may succeed without any other change.
    ///
    /// `ContextRebuild` counts as retryable: the previous context stays
    /// current and the type stays registered, so the next request for the
    /// same shape attempts the rebuild again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StaleContext { .. } | Error::ContextRebuild { .. })
    }
}
