//! Error types for the database facade.

use tessera_config::ConfigError;
use tessera_index::IndexError;
use tessera_types::SpaceId;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// A space with the same id or name is already registered.
    #[error("space '{name}' ({id}) already exists")]
    SpaceExists { id: SpaceId, name: String },

    #[error("space {0} not found")]
    SpaceNotFound(SpaceId),

    /// Statement, index or transaction failure.
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database lock poisoned")]
    LockPoisoned,
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
