//! # Tessera
//!
//! Secondary indexes over a transactional LSM key-value engine.
//!
//! A space holds tuples under a unique primary index and keeps any number of
//! secondary indexes consistent with it. Secondary indexes are non-covering:
//! they store a partial tuple (their own key fields plus the primary key
//! fields) and resolve it to the full tuple through the primary index.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         Database                         │
//! │  ┌──────────┐   ┌─────────────┐   ┌────────────────────┐ │
//! │  │  Space   │ → │  Mutation   │ → │  KvEngine          │ │
//! │  │ registry │   │  planning   │   │  (OCC, per-index   │ │
//! │  │  + LSNs  │   │  + cursors  │   │   ordered storage) │ │
//! │  └──────────┘   └─────────────┘   └────────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use tessera::{Database, IteratorType, Key, Request, ReplaceRequest};
//!
//! let db = Database::in_memory();
//! let users = db.create_space(users_def)?;
//!
//! let mut tx = db.begin()?;
//! db.execute(&mut tx, users.id(), &Request::Replace(ReplaceRequest::insert(tuple)))?;
//! db.commit(tx)?;
//!
//! let by_email = users.index(IndexId::new(1))?;
//! let found = by_email.find_by_key(None, &email_key)?;
//! ```

mod database;
mod error;

pub use database::Database;
pub use error::{DatabaseError, Result};

// Index layer
pub use tessera_index::{
    DeleteRequest, IndexCursor, IndexDef, IndexError, IndexHandle, IndexKind, IndexRef,
    IteratorType, ReplaceKind, ReplaceRequest, Request, SchemaClock, SchemaVersionSource,
    SecondaryKeyDefs, Space, SpaceDef, SpaceOptions, TransactionContext, UpdateRequest,
    UpsertRequest, WriteMode,
};

// Tuples and key definitions
pub use tessera_tuple::{Key, KeyDef, KeyPart, Tuple, TupleError, TupleFormat, UpdateOp};

// Engine
pub use tessera_engine::{EngineError, KvEngine, MemoryEngine};

// Configuration
pub use tessera_config::{ConfigError, ConfigLoader, TesseraConfig};

// Core types
pub use tessera_types::{FieldType, IndexId, Lsn, SchemaVersion, SpaceId, Value};
