//! Error types for the storage engine.

use tessera_tuple::TupleError;
use tessera_types::Lsn;
use thiserror::Error;

use crate::EngineIndexId;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur inside the storage engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The index handle does not refer to an open index.
    #[error("unknown index: {0}")]
    UnknownIndex(EngineIndexId),

    /// Commit was called on a transaction that was not prepared.
    #[error("transaction {0} was not prepared")]
    NotPrepared(u64),

    /// Commit LSNs must never go backwards.
    #[error("commit lsn {lsn} is behind the last committed lsn {last}")]
    NonMonotonicLsn { lsn: Lsn, last: Lsn },

    /// Engine state lock was poisoned by a panicking thread.
    #[error("engine lock poisoned")]
    LockPoisoned,

    /// A stored key or value could not be encoded or decoded.
    #[error("engine codec error: {0}")]
    Codec(#[from] TupleError),
}
