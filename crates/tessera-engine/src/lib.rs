//! # tessera-engine: Storage engine interface for `Tessera`
//!
//! The index layer treats the storage engine as a transactional, ordered
//! key-value store. This crate defines that contract as the [`KvEngine`]
//! trait and ships [`MemoryEngine`], a B-tree backed implementation with
//! optimistic concurrency control used by tests and embedded deployments.
//!
//! # Contract
//!
//! - Keys are encoded [`Key`]s ordered part by part under the comparator key
//!   definition passed to [`KvEngine::open_index`].
//! - A *prefix* key (fewer parts than the comparator) addresses every entry
//!   that starts with it. [`KvEngine::get`] returns the first such entry.
//! - Writes are buffered in a transaction and become visible on
//!   [`KvEngine::commit`]. A transaction must be prepared first; prepare
//!   reports a conflict when another transaction changed what it read or
//!   wrote.
//! - Cursors read committed state and yield values in the requested
//!   [`Order`].
//! - Upserts are applied lazily by the engine against whatever value is
//!   current when the write becomes visible.
//!
//! [`Key`]: tessera_tuple::Key

use std::fmt::{self, Display};

use bytes::Bytes;
use tessera_tuple::{Key, KeyDef, Tuple, UpdateOp};
use tessera_types::Lsn;

mod error;
mod memory;

#[cfg(test)]
mod tests;

pub use error::{EngineError, Result};
pub use memory::{MemoryCursor, MemoryEngine, MemoryTx};

/// Engine-assigned handle of an opened index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineIndexId(u32);

impl EngineIndexId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for EngineIndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine-index-{}", self.0)
    }
}

/// Iteration order of an engine cursor relative to its start key.
///
/// Entries whose key starts with the start key compare *equal* to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    /// Ascending, from the first entry `>=` the key.
    Ge,
    /// Ascending, from the first entry `>` the key.
    Gt,
    /// Descending, from the last entry `<=` the key.
    Le,
    /// Descending, from the last entry `<` the key.
    Lt,
}

impl Order {
    pub fn is_descending(self) -> bool {
        matches!(self, Order::Le | Order::Lt)
    }
}

/// Result of preparing a transaction for commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// The transaction may commit.
    Ok,
    /// The transaction conflicts with a concurrent one and must roll back.
    Conflict,
}

/// A transactional, ordered key-value engine.
///
/// Implementations are shared between threads; transactions and cursors are
/// owned by one caller at a time.
pub trait KvEngine: Send + Sync {
    /// An open transaction.
    type Tx: Send;
    /// An open cursor.
    type Cursor: Send;

    /// Opens (or creates) an index ordered by `comparator`.
    fn open_index(&self, comparator: &KeyDef) -> Result<EngineIndexId>;

    /// Drops an index and all of its entries.
    fn drop_index(&self, index: EngineIndexId) -> Result<()>;

    /// Begins a transaction.
    fn begin(&self) -> Result<Self::Tx>;

    /// Validates a transaction for commit.
    fn prepare(&self, tx: &mut Self::Tx) -> Result<PrepareOutcome>;

    /// Makes a prepared transaction's writes visible at `lsn`.
    fn commit(&self, tx: Self::Tx, lsn: Lsn) -> Result<()>;

    /// Discards a transaction.
    fn rollback(&self, tx: Self::Tx);

    /// Point or prefix lookup.
    ///
    /// With a transaction the lookup sees its own writes and is recorded for
    /// conflict detection.
    fn get(&self, tx: Option<&Self::Tx>, index: EngineIndexId, key: &Key)
    -> Result<Option<Bytes>>;

    /// Buffers a write of `value` under `key`.
    fn put(&self, tx: &mut Self::Tx, index: EngineIndexId, key: &Key, value: Bytes)
    -> Result<()>;

    /// Buffers a delete of `key`.
    fn delete(&self, tx: &mut Self::Tx, index: EngineIndexId, key: &Key) -> Result<()>;

    /// Buffers an upsert: insert `tuple` if its key is absent, otherwise
    /// apply `ops` to the current value.
    fn upsert(
        &self,
        tx: &mut Self::Tx,
        index: EngineIndexId,
        tuple: &Tuple,
        ops: &[UpdateOp],
        index_base: u32,
    ) -> Result<()>;

    /// Opens a cursor over committed state.
    fn cursor(&self, index: EngineIndexId, key: &Key, order: Order) -> Result<Self::Cursor>;

    /// Returns the next value, or `None` at the end.
    fn cursor_next(&self, cursor: &mut Self::Cursor) -> Result<Option<Bytes>>;

    /// Releases a cursor.
    fn cursor_close(&self, cursor: Self::Cursor);

    /// Total stored bytes of an index.
    fn index_bsize(&self, index: EngineIndexId) -> Result<u64>;
}
