//! Statement requests accepted by a space.

use tessera_tuple::{Key, Tuple, UpdateOp};
use tessera_types::IndexId;

/// Whether writes are replaying already validated rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Recovery is complete: inserts check primary key uniqueness.
    #[default]
    Normal,
    /// Rows are being replayed: inserts behave like replaces.
    Recovery,
}

/// Insert fails on an existing primary key; replace overwrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceKind {
    Insert,
    Replace,
}

#[derive(Debug, Clone)]
pub struct ReplaceRequest {
    pub kind: ReplaceKind,
    pub tuple: Tuple,
}

impl ReplaceRequest {
    pub fn insert(tuple: Tuple) -> Self {
        Self {
            kind: ReplaceKind::Insert,
            tuple,
        }
    }

    pub fn replace(tuple: Tuple) -> Self {
        Self {
            kind: ReplaceKind::Replace,
            tuple,
        }
    }
}

/// Deletes the tuple found by a full key of a unique index.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub index_id: IndexId,
    pub key: Key,
}

/// Patches the tuple found by a full key of a unique index.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub index_id: IndexId,
    pub key: Key,
    pub ops: Vec<UpdateOp>,
    /// Field numbering base of `ops`, 0 or 1.
    pub index_base: u32,
}

/// Inserts `tuple`, or patches the existing tuple with the same primary key.
#[derive(Debug, Clone)]
pub struct UpsertRequest {
    pub tuple: Tuple,
    pub ops: Vec<UpdateOp>,
    /// Field numbering base of `ops`, 0 or 1.
    pub index_base: u32,
}

/// Any statement a space executes.
#[derive(Debug, Clone)]
pub enum Request {
    Replace(ReplaceRequest),
    Delete(DeleteRequest),
    Update(UpdateRequest),
    Upsert(UpsertRequest),
}
