//! # tessera-index: Secondary indexes over a key-value engine for `Tessera`
//!
//! This crate keeps a space's primary index and any number of non-covering
//! secondary indexes consistent on top of a primitive transactional
//! key-value engine ([`KvEngine`]).
//!
//! ## Storage layout
//!
//! - The primary index maps the primary key to the full tuple.
//! - A secondary index stores a *partial tuple* (its own key fields followed
//!   by the primary key fields it lacks) as both engine key and engine value.
//!   Lookups through a secondary index resolve the partial tuple to the full
//!   tuple with a second lookup in the primary index.
//!
//! ## Statements
//!
//! Every mutation ([`Space::execute_replace`], [`Space::execute_update`],
//! [`Space::execute_delete`], [`Space::execute_upsert`]) first plans: it
//! validates the tuple, performs every lookup and uniqueness check, and
//! collects the engine writes in order. Only a complete plan is applied, so
//! a failed statement leaves no writes behind.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera_engine::MemoryEngine;
//! use tessera_index::{IndexDef, IteratorType, ReplaceRequest, SchemaClock, Space, SpaceDef,
//!     SpaceOptions, TransactionContext, WriteMode};
//!
//! let engine = Arc::new(MemoryEngine::new());
//! let clock = Arc::new(SchemaClock::new());
//! let space = Space::open(def, SpaceOptions::default(), Arc::clone(&engine), clock)?;
//!
//! let mut tx = TransactionContext::begin(Arc::clone(&engine))?;
//! space.execute_replace(&mut tx, &ReplaceRequest::insert(tuple), WriteMode::Normal)?;
//! tx.commit(Lsn::new(1))?;
//!
//! let mut cursor = space.index(IndexId::new(1))?.cursor(IteratorType::Eq, &key)?;
//! while let Some(tuple) = cursor.next()? {
//!     // ...
//! }
//! ```
//!
//! [`KvEngine`]: tessera_engine::KvEngine

mod cursor;
mod error;
mod handle;
mod mutation;
mod request;
mod schema;
mod space;
mod txn;


pub use cursor::{IndexCursor, IteratorType};
pub use error::{IndexError, Result};
pub use handle::{IndexHandle, IndexKind, SecondaryKeyDefs};
pub use request::{
    DeleteRequest, ReplaceKind, ReplaceRequest, Request, UpdateRequest, UpsertRequest, WriteMode,
};
pub use schema::{SchemaClock, SchemaVersionSource};
pub use space::{IndexDef, IndexRef, Space, SpaceDef, SpaceOptions};
pub use txn::TransactionContext;
