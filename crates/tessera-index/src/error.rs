//! Error types for index operations.

use tessera_engine::EngineError;
use tessera_tuple::TupleError;
use tessera_types::IndexId;
use thiserror::Error;

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while mutating or reading indexes.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Malformed tuple, key or update operations. The statement performed
    /// no writes.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A unique index already holds the key. The statement performed no
    /// writes.
    #[error("duplicate key exists in unique index '{index}' in space '{space}'")]
    DuplicateKey { index: String, space: String },

    /// The operation is not available for this space or index.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Prepare found a conflicting concurrent transaction; the transaction
    /// was rolled back.
    #[error("transaction has been aborted by conflict")]
    TransactionConflict,

    /// The storage engine failed.
    #[error("storage error: {0}")]
    Storage(#[from] EngineError),

    /// The request names an index the space does not have.
    #[error("no index {index} in space '{space}'")]
    IndexNotFound { space: String, index: IndexId },
}

impl From<TupleError> for IndexError {
    fn from(e: TupleError) -> Self {
        IndexError::Validation(e.to_string())
    }
}
