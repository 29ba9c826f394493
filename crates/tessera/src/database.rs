//! The database handle: engine, schema clock, space registry and LSNs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tessera_config::TesseraConfig;
use tessera_engine::{KvEngine, MemoryEngine};
use tessera_index::{
    Request, SchemaClock, SchemaVersionSource, Space, SpaceDef, SpaceOptions, TransactionContext,
    WriteMode,
};
use tessera_tuple::Tuple;
use tessera_types::{Lsn, SchemaVersion, SpaceId};
use tracing::{debug, info};

use crate::error::{DatabaseError, Result};

struct DatabaseInner<E: KvEngine> {
    spaces: HashMap<SpaceId, Arc<Space<E>>>,
    /// Last LSN handed to a commit or a snapshot.
    last_lsn: Lsn,
}

/// The main Tessera database handle.
///
/// Cloning is cheap; clones share the engine, the space registry and the
/// LSN sequence.
///
/// # Example
///
/// ```ignore
/// use tessera::{Database, IndexDef, KeyPart, FieldType, ReplaceRequest, SpaceDef};
///
/// let db = Database::in_memory();
/// let users = db.create_space(SpaceDef::new(SpaceId::new(512), "users")
///     .with_index(IndexDef::new(IndexId::PRIMARY, "pk", true,
///         vec![KeyPart::new(0, FieldType::Unsigned)])))?;
///
/// let mut tx = db.begin()?;
/// db.execute(&mut tx, users.id(), &Request::Replace(ReplaceRequest::insert(tuple)))?;
/// let lsn = db.commit(tx)?;
/// ```
pub struct Database<E: KvEngine> {
    engine: Arc<E>,
    schema: Arc<SchemaClock>,
    options: SpaceOptions,
    recovery_complete: Arc<AtomicBool>,
    inner: Arc<RwLock<DatabaseInner<E>>>,
}

impl<E: KvEngine> Clone for Database<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            schema: Arc::clone(&self.schema),
            options: self.options.clone(),
            recovery_complete: Arc::clone(&self.recovery_complete),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Database<MemoryEngine> {
    /// A database over a fresh in-memory engine with default configuration.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEngine::new()))
    }
}

impl<E: KvEngine> Database<E> {
    /// A database over `engine` with default configuration.
    pub fn new(engine: Arc<E>) -> Self {
        Self::build(engine, &TesseraConfig::default())
    }

    /// A database over `engine` configured by `config`.
    pub fn with_config(engine: Arc<E>, config: &TesseraConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(engine, config))
    }

    fn build(engine: Arc<E>, config: &TesseraConfig) -> Self {
        let options = SpaceOptions {
            max_tuple_size: Some(config.space.max_tuple_size),
            enforce_field_count: config.space.exact_field_count,
        };
        Self {
            engine,
            schema: Arc::new(SchemaClock::new()),
            options,
            recovery_complete: Arc::new(AtomicBool::new(config.recovery.complete_on_open)),
            inner: Arc::new(RwLock::new(DatabaseInner {
                spaces: HashMap::new(),
                last_lsn: Lsn::ZERO,
            })),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Options applied to every space this database creates.
    pub fn space_options(&self) -> &SpaceOptions {
        &self.options
    }

    /// Opens every index of `def` and registers the space.
    pub fn create_space(&self, def: SpaceDef) -> Result<Arc<Space<E>>> {
        let mut inner = self.inner.write().map_err(|_| DatabaseError::LockPoisoned)?;
        if let Some(existing) = inner
            .spaces
            .values()
            .find(|space| space.id() == def.id || space.name() == def.name)
        {
            return Err(DatabaseError::SpaceExists {
                id: existing.id(),
                name: existing.name().to_owned(),
            });
        }

        let space = Arc::new(Space::open(
            def,
            self.options.clone(),
            Arc::clone(&self.engine),
            Arc::clone(&self.schema) as Arc<dyn SchemaVersionSource>,
        )?);
        inner.spaces.insert(space.id(), Arc::clone(&space));
        self.schema.bump();

        info!(space = %space.name(), id = %space.id(), "created space");
        Ok(space)
    }

    /// Unregisters a space and drops its engine indexes. Open cursors over
    /// the space end at their next step.
    pub fn drop_space(&self, id: SpaceId) -> Result<()> {
        let space = {
            let mut inner = self.inner.write().map_err(|_| DatabaseError::LockPoisoned)?;
            inner
                .spaces
                .remove(&id)
                .ok_or(DatabaseError::SpaceNotFound(id))?
        };
        self.schema.bump();
        space.drop_storage()?;

        info!(space = %space.name(), id = %id, "dropped space");
        Ok(())
    }

    pub fn space(&self, id: SpaceId) -> Result<Arc<Space<E>>> {
        let inner = self.inner.read().map_err(|_| DatabaseError::LockPoisoned)?;
        inner
            .spaces
            .get(&id)
            .cloned()
            .ok_or(DatabaseError::SpaceNotFound(id))
    }

    pub fn space_by_name(&self, name: &str) -> Result<Option<Arc<Space<E>>>> {
        let inner = self.inner.read().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(inner
            .spaces
            .values()
            .find(|space| space.name() == name)
            .cloned())
    }

    /// Registered space ids, ascending.
    pub fn space_ids(&self) -> Result<Vec<SpaceId>> {
        let inner = self.inner.read().map_err(|_| DatabaseError::LockPoisoned)?;
        let mut ids: Vec<SpaceId> = inner.spaces.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn begin(&self) -> Result<TransactionContext<E>> {
        Ok(TransactionContext::begin(Arc::clone(&self.engine))?)
    }

    /// Commits `tx` under the next LSN and returns it.
    ///
    /// The LSN is consumed only if the commit succeeds.
    pub fn commit(&self, tx: TransactionContext<E>) -> Result<Lsn> {
        let mut inner = self.inner.write().map_err(|_| DatabaseError::LockPoisoned)?;
        let lsn = inner.last_lsn.next();
        tx.commit(lsn)?;
        inner.last_lsn = lsn;
        debug!(lsn = %lsn, "committed transaction");
        Ok(lsn)
    }

    pub fn rollback(&self, tx: TransactionContext<E>) {
        tx.rollback();
    }

    /// Last LSN assigned to a commit or snapshot.
    pub fn last_lsn(&self) -> Result<Lsn> {
        let inner = self.inner.read().map_err(|_| DatabaseError::LockPoisoned)?;
        Ok(inner.last_lsn)
    }

    /// Runs one statement against a registered space in the current write
    /// mode.
    pub fn execute(
        &self,
        tx: &mut TransactionContext<E>,
        space_id: SpaceId,
        request: &Request,
    ) -> Result<Option<Tuple>> {
        let space = self.space(space_id)?;
        Ok(space.execute(tx, request, self.write_mode())?)
    }

    /// Replays snapshot rows into a space, each committed at `lsn`. Returns
    /// the number of rows applied.
    pub fn apply_snapshot<I>(&self, space_id: SpaceId, rows: I, lsn: Lsn) -> Result<usize>
    where
        I: IntoIterator<Item = Tuple>,
    {
        let space = self.space(space_id)?;
        let mut inner = self.inner.write().map_err(|_| DatabaseError::LockPoisoned)?;
        let mut applied = 0;
        for row in rows {
            space.apply_snapshot_row(&row, lsn)?;
            applied += 1;
        }
        inner.last_lsn = inner.last_lsn.max(lsn);

        info!(space = %space.name(), rows = applied, lsn = %lsn, "applied snapshot");
        Ok(applied)
    }

    /// `Recovery` until recovery completes, `Normal` afterwards.
    pub fn write_mode(&self) -> WriteMode {
        if self.recovery_complete.load(Ordering::Acquire) {
            WriteMode::Normal
        } else {
            WriteMode::Recovery
        }
    }

    pub fn set_recovery_complete(&self, complete: bool) {
        let previous = self.recovery_complete.swap(complete, Ordering::AcqRel);
        if previous != complete {
            info!(complete, "recovery state changed");
        }
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema.current()
    }

    /// Advances the schema version for schema changes made outside the
    /// space registry. Every open cursor ends at its next step.
    pub fn bump_schema_version(&self) -> SchemaVersion {
        self.schema.bump()
    }
}
