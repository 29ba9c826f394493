//! Index handles: key definitions bound to engine indexes.

use bytes::Bytes;
use tessera_engine::{EngineIndexId, KvEngine};
use tessera_tuple::{Key, KeyDef, Tuple, build_extractor, condense, extract_key, merge};
use tessera_types::{IndexId, Value};
use tracing::debug;

use crate::error::Result;

/// Derived key definitions owned by a secondary index.
///
/// All three are built together when the index opens and released together
/// with the handle.
#[derive(Debug, Clone)]
pub struct SecondaryKeyDefs {
    /// Secondary parts followed by the missing primary parts, over original
    /// tuple fields. Extracts the partial tuple from a full tuple.
    pub merged: KeyDef,
    /// `merged` renumbered to partial tuple positions. The engine comparator.
    pub condensed: KeyDef,
    /// Primary key positions inside the partial tuple.
    pub extractor: KeyDef,
}

impl SecondaryKeyDefs {
    /// Derives the secondary layout for `secondary` under `primary`.
    pub fn derive(secondary: &KeyDef, primary: &KeyDef) -> Result<Self> {
        let merged = merge(secondary, primary);
        let extractor = build_extractor(primary, &merged)?;
        let condensed = condense(&merged);
        Ok(Self {
            merged,
            condensed,
            extractor,
        })
    }
}

/// Primary or secondary flavour of an index.
#[derive(Debug, Clone)]
pub enum IndexKind {
    /// Stores full tuples under the primary key.
    Primary,
    /// Stores partial tuples as both key and value.
    Secondary(SecondaryKeyDefs),
}

/// A user key definition bound to its engine index.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    key_def: KeyDef,
    kind: IndexKind,
    engine_index: EngineIndexId,
}

impl IndexHandle {
    pub(crate) fn open_primary<E: KvEngine>(engine: &E, key_def: KeyDef) -> Result<Self> {
        let engine_index = engine.open_index(&key_def)?;
        debug!(index = %key_def, engine_index = %engine_index, "opened primary index");
        Ok(Self {
            key_def,
            kind: IndexKind::Primary,
            engine_index,
        })
    }

    pub(crate) fn open_secondary<E: KvEngine>(
        engine: &E,
        key_def: KeyDef,
        primary: &KeyDef,
    ) -> Result<Self> {
        let defs = SecondaryKeyDefs::derive(&key_def, primary)?;
        let engine_index = engine.open_index(&defs.condensed)?;
        debug!(
            index = %key_def,
            merged = %defs.merged,
            condensed = %defs.condensed,
            extractor = %defs.extractor,
            engine_index = %engine_index,
            "opened secondary index"
        );
        Ok(Self {
            key_def,
            kind: IndexKind::Secondary(defs),
            engine_index,
        })
    }

    /// The user key definition.
    pub fn key_def(&self) -> &KeyDef {
        &self.key_def
    }

    pub fn kind(&self) -> &IndexKind {
        &self.kind
    }

    pub fn id(&self) -> IndexId {
        self.key_def.index_id()
    }

    pub fn name(&self) -> &str {
        self.key_def.name()
    }

    pub fn engine_index(&self) -> EngineIndexId {
        self.engine_index
    }

    pub fn is_primary(&self) -> bool {
        matches!(self.kind, IndexKind::Primary)
    }

    pub fn is_unique(&self) -> bool {
        self.key_def.is_unique()
    }

    /// Definition that extracts this index's stored key from a full tuple.
    pub fn key_extractor(&self) -> &KeyDef {
        match &self.kind {
            IndexKind::Primary => &self.key_def,
            IndexKind::Secondary(defs) => &defs.merged,
        }
    }

    /// Definition the engine orders stored entries by.
    pub fn comparator(&self) -> &KeyDef {
        match &self.kind {
            IndexKind::Primary => &self.key_def,
            IndexKind::Secondary(defs) => &defs.condensed,
        }
    }

    /// Engine key of a full tuple in this index.
    pub(crate) fn stored_key(&self, fields: &[Value]) -> Result<Key> {
        Ok(extract_key(fields, self.key_extractor())?)
    }

    /// Engine value stored under `key` for the tuple `tuple_bytes`.
    pub(crate) fn stored_value(&self, key: &Key, tuple_bytes: &Bytes) -> Bytes {
        match self.kind {
            IndexKind::Primary => tuple_bytes.clone(),
            IndexKind::Secondary(_) => key.as_bytes().clone(),
        }
    }

    /// Engine key of an entry read back from this index.
    pub(crate) fn key_of_stored(&self, stored: Bytes) -> Result<Key> {
        match self.kind {
            IndexKind::Primary => self.stored_key(&Tuple::from_bytes(stored).decode()?),
            IndexKind::Secondary(_) => Ok(Key::from_bytes(stored)),
        }
    }

    /// Leading parts of a stored key that the uniqueness constraint covers.
    pub(crate) fn unique_prefix(&self, stored_key: &Key) -> Result<Key> {
        match self.kind {
            IndexKind::Primary => Ok(stored_key.clone()),
            IndexKind::Secondary(_) => Ok(stored_key.prefix(self.key_def.part_count())?),
        }
    }
}
