//! Spaces: a primary index plus secondary indexes sharing one tuple format.

use std::sync::Arc;

use tessera_engine::KvEngine;
use tessera_tuple::{Key, KeyDef, KeyPart, Tuple, TupleFormat, extract_key, validate_key};
use tessera_types::{IndexId, Lsn, SchemaVersion, SpaceId};
use tracing::{info, warn};

use crate::cursor::{IndexCursor, IteratorType};
use crate::error::{IndexError, Result};
use crate::handle::{IndexHandle, IndexKind};
use crate::mutation::MutationCoordinator;
use crate::request::{
    DeleteRequest, ReplaceRequest, Request, UpdateRequest, UpsertRequest, WriteMode,
};
use crate::schema::SchemaVersionSource;
use crate::txn::TransactionContext;

/// Declaration of one index.
#[derive(Debug, Clone)]
pub struct IndexDef {
    pub id: IndexId,
    pub name: String,
    pub unique: bool,
    pub parts: Vec<KeyPart>,
}

impl IndexDef {
    pub fn new(id: IndexId, name: impl Into<String>, unique: bool, parts: Vec<KeyPart>) -> Self {
        Self {
            id,
            name: name.into(),
            unique,
            parts,
        }
    }
}

/// Declaration of a space. The first index is the primary index.
#[derive(Debug, Clone)]
pub struct SpaceDef {
    pub id: SpaceId,
    pub name: String,
    pub indexes: Vec<IndexDef>,
    /// Exact number of fields every tuple must have, if fixed.
    pub field_count: Option<usize>,
}

impl SpaceDef {
    pub fn new(id: SpaceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            indexes: Vec::new(),
            field_count: None,
        }
    }

    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_field_count(mut self, count: usize) -> Self {
        self.field_count = Some(count);
        self
    }
}

/// Process-wide limits applied when a space opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceOptions {
    /// Largest accepted encoded tuple, in bytes.
    pub max_tuple_size: Option<usize>,
    /// Whether [`SpaceDef::field_count`] is enforced.
    pub enforce_field_count: bool,
}

impl Default for SpaceOptions {
    fn default() -> Self {
        Self {
            max_tuple_size: Some(1024 * 1024),
            enforce_field_count: true,
        }
    }
}

/// An open space over engine `E`.
pub struct Space<E: KvEngine> {
    id: SpaceId,
    name: String,
    engine: Arc<E>,
    indexes: Vec<IndexHandle>,
    format: TupleFormat,
    schema: Arc<dyn SchemaVersionSource>,
}

impl<E: KvEngine> std::fmt::Debug for Space<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Space")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("indexes", &self.indexes)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl<E: KvEngine> Space<E> {
    /// Opens every index of `def` in the engine.
    ///
    /// The first index must be unique; it becomes the primary index. If any
    /// index fails to open, the engine indexes opened so far are dropped.
    pub fn open(
        def: SpaceDef,
        options: SpaceOptions,
        engine: Arc<E>,
        schema: Arc<dyn SchemaVersionSource>,
    ) -> Result<Self> {
        let key_defs = Self::key_defs(&def)?;

        let mut format = TupleFormat::from_key_defs(&key_defs)?;
        if let Some(limit) = options.max_tuple_size {
            format = format.with_max_tuple_size(limit);
        }
        if let (true, Some(count)) = (options.enforce_field_count, def.field_count) {
            format = format.with_exact_field_count(count);
        }

        let mut indexes: Vec<IndexHandle> = Vec::with_capacity(key_defs.len());
        let mut key_defs = key_defs.into_iter();
        let Some(primary) = key_defs.next() else {
            return Err(IndexError::Validation(format!(
                "space '{}' has no primary index",
                def.name
            )));
        };
        let primary_def = primary.clone();

        let opened = std::iter::once(IndexHandle::open_primary(engine.as_ref(), primary))
            .chain(key_defs.map(|key_def| {
                IndexHandle::open_secondary(engine.as_ref(), key_def, &primary_def)
            }));
        for handle in opened {
            match handle {
                Ok(handle) => indexes.push(handle),
                Err(e) => {
                    for handle in &indexes {
                        if let Err(drop_err) = engine.drop_index(handle.engine_index()) {
                            warn!(index = %handle.key_def(), error = %drop_err, "failed to drop index after open error");
                        }
                    }
                    return Err(e);
                }
            }
        }

        info!(space = %def.name, id = %def.id, indexes = indexes.len(), "opened space");
        Ok(Self {
            id: def.id,
            name: def.name,
            engine,
            indexes,
            format,
            schema,
        })
    }

    fn key_defs(def: &SpaceDef) -> Result<Vec<KeyDef>> {
        let Some(primary) = def.indexes.first() else {
            return Err(IndexError::Validation(format!(
                "space '{}' has no primary index",
                def.name
            )));
        };
        if !primary.unique {
            return Err(IndexError::Validation(format!(
                "primary index '{}' of space '{}' must be unique",
                primary.name, def.name
            )));
        }
        for (i, index) in def.indexes.iter().enumerate() {
            if def.indexes[..i].iter().any(|other| other.id == index.id) {
                return Err(IndexError::Validation(format!(
                    "space '{}' declares index {} twice",
                    def.name, index.id
                )));
            }
        }

        def.indexes
            .iter()
            .map(|index| {
                KeyDef::new(
                    def.id,
                    index.id,
                    index.name.clone(),
                    index.unique,
                    index.parts.clone(),
                )
                .map_err(IndexError::from)
            })
            .collect()
    }

    pub fn id(&self) -> SpaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn format(&self) -> &TupleFormat {
        &self.format
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    pub(crate) fn schema_version(&self) -> SchemaVersion {
        self.schema.current()
    }

    pub(crate) fn handles(&self) -> &[IndexHandle] {
        &self.indexes
    }

    /// The primary index.
    pub fn primary(&self) -> IndexRef<'_, E> {
        IndexRef {
            space: self,
            handle: &self.indexes[0],
        }
    }

    /// Index by id.
    pub fn index(&self, id: IndexId) -> Result<IndexRef<'_, E>> {
        self.indexes
            .iter()
            .find(|handle| handle.id() == id)
            .map(|handle| IndexRef {
                space: self,
                handle,
            })
            .ok_or_else(|| IndexError::IndexNotFound {
                space: self.name.clone(),
                index: id,
            })
    }

    /// All indexes, primary first.
    pub fn indexes(&self) -> impl Iterator<Item = IndexRef<'_, E>> {
        self.indexes.iter().map(move |handle| IndexRef {
            space: self,
            handle,
        })
    }

    /// Drops every engine index of the space.
    pub fn drop_storage(&self) -> Result<()> {
        for handle in &self.indexes {
            self.engine.drop_index(handle.engine_index())?;
        }
        info!(space = %self.name, "dropped space storage");
        Ok(())
    }

    /// Inserts or replaces a tuple in every index. Returns the new tuple.
    pub fn execute_replace(
        &self,
        tx: &mut TransactionContext<E>,
        request: &ReplaceRequest,
        mode: WriteMode,
    ) -> Result<Option<Tuple>> {
        MutationCoordinator::new(self).replace(tx, request, mode)
    }

    /// Deletes the tuple addressed by a unique key from every index.
    pub fn execute_delete(
        &self,
        tx: &mut TransactionContext<E>,
        request: &DeleteRequest,
    ) -> Result<Option<Tuple>> {
        MutationCoordinator::new(self).delete(tx, request)
    }

    /// Patches the tuple addressed by a unique key. Returns the new tuple,
    /// or `None` if no tuple matched.
    pub fn execute_update(
        &self,
        tx: &mut TransactionContext<E>,
        request: &UpdateRequest,
    ) -> Result<Option<Tuple>> {
        MutationCoordinator::new(self).update(tx, request)
    }

    /// Hands an upsert to the engine. Only single-index spaces support it.
    pub fn execute_upsert(
        &self,
        tx: &mut TransactionContext<E>,
        request: &UpsertRequest,
    ) -> Result<Option<Tuple>> {
        MutationCoordinator::new(self).upsert(tx, request)
    }

    /// Dispatches any request.
    pub fn execute(
        &self,
        tx: &mut TransactionContext<E>,
        request: &Request,
        mode: WriteMode,
    ) -> Result<Option<Tuple>> {
        match request {
            Request::Replace(request) => self.execute_replace(tx, request, mode),
            Request::Delete(request) => self.execute_delete(tx, request),
            Request::Update(request) => self.execute_update(tx, request),
            Request::Upsert(request) => self.execute_upsert(tx, request),
        }
    }

    /// Replays one row of a snapshot in its own transaction committed at
    /// `lsn`.
    pub fn apply_snapshot_row(&self, tuple: &Tuple, lsn: Lsn) -> Result<()> {
        let mut tx = TransactionContext::begin(Arc::clone(&self.engine))?;
        let request = ReplaceRequest::replace(tuple.clone());
        match self.execute_replace(&mut tx, &request, WriteMode::Recovery) {
            Ok(_) => tx.commit(lsn),
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }
}

/// A borrowed view of one index of a space: the uniform index contract.
pub struct IndexRef<'a, E: KvEngine> {
    space: &'a Space<E>,
    handle: &'a IndexHandle,
}

impl<E: KvEngine> Clone for IndexRef<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: KvEngine> Copy for IndexRef<'_, E> {}

impl<'a, E: KvEngine> IndexRef<'a, E> {
    pub fn space(&self) -> &'a Space<E> {
        self.space
    }

    pub fn handle(&self) -> &'a IndexHandle {
        self.handle
    }

    /// Definition that extracts this index's stored key from a full tuple.
    pub fn key_extractor(&self) -> &'a KeyDef {
        self.handle.key_extractor()
    }

    /// Point lookup by a full key of a unique index.
    ///
    /// Inside a transaction the lookup sees the transaction's own writes.
    pub fn find_by_key(
        &self,
        tx: Option<&TransactionContext<E>>,
        key: &Key,
    ) -> Result<Option<Tuple>> {
        self.validate_exact_key(key)?;
        let tx = tx.map(TransactionContext::engine_tx).transpose()?;
        self.lookup(tx, key)
    }

    /// Checks that `key` addresses at most one tuple of this index.
    pub(crate) fn validate_exact_key(&self, key: &Key) -> Result<()> {
        if !self.handle.is_unique() {
            return Err(IndexError::NotSupported(format!(
                "point lookup on non-unique index '{}' in space '{}'",
                self.handle.name(),
                self.space.name
            )));
        }
        validate_key(self.handle.key_def(), &key.decode()?, true)?;
        Ok(())
    }

    /// Engine lookup resolving secondary entries through the primary index.
    pub(crate) fn lookup(&self, tx: Option<&E::Tx>, key: &Key) -> Result<Option<Tuple>> {
        let Some(stored) = self.space.engine.get(tx, self.handle.engine_index(), key)? else {
            return Ok(None);
        };
        self.resolve(tx, Tuple::from_bytes(stored))
    }

    /// Turns a stored entry of this index into the full tuple.
    pub(crate) fn resolve(&self, tx: Option<&E::Tx>, stored: Tuple) -> Result<Option<Tuple>> {
        match self.handle.kind() {
            IndexKind::Primary => Ok(Some(stored)),
            IndexKind::Secondary(defs) => {
                let partial = stored.decode()?;
                let primary_key = extract_key(&partial, &defs.extractor)?;
                self.space.primary().lookup(tx, &primary_key)
            }
        }
    }

    /// Returns a cursor in its initial state.
    pub fn alloc_cursor(&self) -> IndexCursor<'a, E> {
        IndexCursor::new(*self)
    }

    /// Positions `cursor` for a scan of `iterator_type` from `key`.
    pub fn init_cursor(
        &self,
        cursor: &mut IndexCursor<'a, E>,
        iterator_type: IteratorType,
        key: &Key,
    ) -> Result<()> {
        cursor.init(iterator_type, key)
    }

    /// Allocates and initializes a cursor.
    pub fn cursor(&self, iterator_type: IteratorType, key: &Key) -> Result<IndexCursor<'a, E>> {
        let mut cursor = self.alloc_cursor();
        self.init_cursor(&mut cursor, iterator_type, key)?;
        Ok(cursor)
    }

    /// First tuple of an ascending scan from `key`.
    pub fn min(&self, key: &Key) -> Result<Option<Tuple>> {
        self.cursor(IteratorType::Ge, key)?.next()
    }

    /// First tuple of a descending scan from `key`.
    pub fn max(&self, key: &Key) -> Result<Option<Tuple>> {
        self.cursor(IteratorType::Le, key)?.next()
    }

    /// Number of tuples a scan yields.
    pub fn count(&self, iterator_type: IteratorType, key: &Key) -> Result<u64> {
        let mut cursor = self.cursor(iterator_type, key)?;
        let mut count = 0;
        while cursor.next()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Bytes the engine stores for this index.
    pub fn bsize(&self) -> Result<u64> {
        Ok(self.space.engine.index_bsize(self.handle.engine_index())?)
    }
}
