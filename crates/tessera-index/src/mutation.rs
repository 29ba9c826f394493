//! Multi-index statement execution.
//!
//! Each statement builds a [`Plan`] first: every lookup and uniqueness
//! check runs against the transaction, and the resulting engine writes are
//! collected in order. The plan is applied only once it is complete.

use std::sync::Arc;

use bytes::Bytes;
use tessera_engine::{EngineIndexId, KvEngine};
use tessera_tuple::{Key, Tuple, apply_ops, check_ops};
use tessera_types::Value;
use tracing::debug;

use crate::error::{IndexError, Result};
use crate::handle::IndexHandle;
use crate::request::{
    DeleteRequest, ReplaceKind, ReplaceRequest, UpdateRequest, UpsertRequest, WriteMode,
};
use crate::space::Space;
use crate::txn::TransactionContext;

#[derive(Debug)]
enum WriteOp {
    Put {
        index: EngineIndexId,
        key: Key,
        value: Bytes,
    },
    Delete {
        index: EngineIndexId,
        key: Key,
    },
}

/// Ordered engine writes of one statement.
#[derive(Debug, Default)]
struct Plan {
    writes: Vec<WriteOp>,
}

impl Plan {
    fn put(&mut self, handle: &IndexHandle, key: Key, tuple_bytes: &Bytes) {
        let value = handle.stored_value(&key, tuple_bytes);
        self.writes.push(WriteOp::Put {
            index: handle.engine_index(),
            key,
            value,
        });
    }

    fn delete(&mut self, handle: &IndexHandle, key: Key) {
        self.writes.push(WriteOp::Delete {
            index: handle.engine_index(),
            key,
        });
    }

    fn apply<E: KvEngine>(self, statement: &str, tx: &mut TransactionContext<E>) -> Result<()> {
        debug!(statement, writes = self.writes.len(), "applying statement plan");
        let engine = Arc::clone(tx.engine());
        let engine_tx = tx.engine_tx_mut()?;
        for write in self.writes {
            match write {
                WriteOp::Put { index, key, value } => engine.put(engine_tx, index, &key, value)?,
                WriteOp::Delete { index, key } => engine.delete(engine_tx, index, &key)?,
            }
        }
        Ok(())
    }
}

/// Keeps every index of a space consistent across one statement.
pub(crate) struct MutationCoordinator<'a, E: KvEngine> {
    space: &'a Space<E>,
}

impl<'a, E: KvEngine> MutationCoordinator<'a, E> {
    pub(crate) fn new(space: &'a Space<E>) -> Self {
        Self { space }
    }

    pub(crate) fn replace(
        &self,
        tx: &mut TransactionContext<E>,
        request: &ReplaceRequest,
        mode: WriteMode,
    ) -> Result<Option<Tuple>> {
        let fields = self.space.format().validate(&request.tuple)?;
        let engine_tx = tx.engine_tx()?;

        let plan = match (request.kind, mode) {
            (ReplaceKind::Insert, WriteMode::Normal) => {
                self.plan_insert(engine_tx, &request.tuple, &fields)?
            }
            _ if self.space.index_count() == 1 => {
                self.plan_replace_primary(&request.tuple, &fields)?
            }
            _ => self.plan_replace(engine_tx, &request.tuple, &fields)?,
        };

        plan.apply("replace", tx)?;
        Ok(Some(request.tuple.clone()))
    }

    pub(crate) fn update(
        &self,
        tx: &mut TransactionContext<E>,
        request: &UpdateRequest,
    ) -> Result<Option<Tuple>> {
        let index = self.space.index(request.index_id)?;
        index.validate_exact_key(&request.key)?;
        check_ops(&request.ops, request.index_base)?;

        let engine_tx = tx.engine_tx()?;
        let Some(old) = index.lookup(Some(engine_tx), &request.key)? else {
            return Ok(None);
        };
        let old_fields = old.decode()?;
        let new_fields = apply_ops(old_fields.clone(), &request.ops, request.index_base)?;
        let new_tuple = Tuple::from_values(&new_fields)?;
        self.space.format().validate(&new_tuple)?;

        let primary = self.space.primary().handle();
        let old_key = primary.stored_key(&old_fields)?;
        let new_key = primary.stored_key(&new_fields)?;
        if old_key.decode()? != new_key.decode()? {
            return Err(IndexError::Validation(format!(
                "attempt to modify a tuple field which is part of index '{}' in space '{}'",
                primary.name(),
                self.space.name()
            )));
        }

        let mut plan = Plan::default();
        plan.put(primary, new_key, new_tuple.as_bytes());
        self.plan_secondaries(
            engine_tx,
            &mut plan,
            &new_tuple,
            &new_fields,
            Some(old_fields.as_slice()),
        )?;

        plan.apply("update", tx)?;
        Ok(Some(new_tuple))
    }

    pub(crate) fn delete(
        &self,
        tx: &mut TransactionContext<E>,
        request: &DeleteRequest,
    ) -> Result<Option<Tuple>> {
        let index = self.space.index(request.index_id)?;
        index.validate_exact_key(&request.key)?;

        let mut plan = Plan::default();
        if self.space.index_count() == 1 {
            plan.delete(index.handle(), request.key.clone());
        } else {
            let engine_tx = tx.engine_tx()?;
            let Some(old) = index.lookup(Some(engine_tx), &request.key)? else {
                return Ok(None);
            };
            let old_fields = old.decode()?;
            for handle in self.space.handles() {
                plan.delete(handle, handle.stored_key(&old_fields)?);
            }
        }

        plan.apply("delete", tx)?;
        Ok(None)
    }

    pub(crate) fn upsert(
        &self,
        tx: &mut TransactionContext<E>,
        request: &UpsertRequest,
    ) -> Result<Option<Tuple>> {
        if self.space.index_count() > 1 {
            return Err(IndexError::NotSupported(format!(
                "upsert in space '{}' with more than one index",
                self.space.name()
            )));
        }
        self.space.format().validate(&request.tuple)?;
        check_ops(&request.ops, request.index_base)?;

        let engine = Arc::clone(tx.engine());
        engine.upsert(
            tx.engine_tx_mut()?,
            self.space.primary().handle().engine_index(),
            &request.tuple,
            &request.ops,
            request.index_base,
        )?;
        debug!(space = %self.space.name(), "upsert handed to engine");
        Ok(None)
    }

    /// Insert: every unique index must be free of the new key.
    fn plan_insert(&self, tx: &E::Tx, tuple: &Tuple, fields: &[Value]) -> Result<Plan> {
        let mut plan = Plan::default();
        for handle in self.space.handles() {
            let key = handle.stored_key(fields)?;
            if handle.is_unique() {
                self.check_unique(tx, handle, &key, None)?;
            }
            plan.put(handle, key, tuple.as_bytes());
        }
        Ok(plan)
    }

    /// Replace in a space without secondary indexes: a single put.
    fn plan_replace_primary(&self, tuple: &Tuple, fields: &[Value]) -> Result<Plan> {
        let primary = self.space.primary().handle();
        let mut plan = Plan::default();
        plan.put(primary, primary.stored_key(fields)?, tuple.as_bytes());
        Ok(plan)
    }

    /// Replace: the primary put supersedes the old tuple; secondary entries
    /// of the old tuple are deleted before the new ones are written.
    fn plan_replace(&self, tx: &E::Tx, tuple: &Tuple, fields: &[Value]) -> Result<Plan> {
        let primary = self.space.primary();
        let primary_key = primary.handle().stored_key(fields)?;
        let old_fields = primary
            .lookup(Some(tx), &primary_key)?
            .map(|old| old.decode())
            .transpose()?;

        let mut plan = Plan::default();
        plan.put(primary.handle(), primary_key, tuple.as_bytes());
        self.plan_secondaries(tx, &mut plan, tuple, fields, old_fields.as_deref())?;
        Ok(plan)
    }

    fn plan_secondaries(
        &self,
        tx: &E::Tx,
        plan: &mut Plan,
        tuple: &Tuple,
        fields: &[Value],
        old_fields: Option<&[Value]>,
    ) -> Result<()> {
        for handle in self.space.handles().iter().filter(|h| !h.is_primary()) {
            let new_key = handle.stored_key(fields)?;
            let old_key = old_fields.map(|old| handle.stored_key(old)).transpose()?;
            if handle.is_unique() {
                self.check_unique(tx, handle, &new_key, old_key.as_ref())?;
            }
            if let Some(old_key) = old_key {
                plan.delete(handle, old_key);
            }
            plan.put(handle, new_key, tuple.as_bytes());
        }
        Ok(())
    }

    /// Fails if the unique part of `key` is already taken by an entry other
    /// than `replacing`.
    fn check_unique(
        &self,
        tx: &E::Tx,
        handle: &IndexHandle,
        key: &Key,
        replacing: Option<&Key>,
    ) -> Result<()> {
        let prefix = handle.unique_prefix(key)?;
        let Some(found) = self
            .space
            .engine()
            .get(Some(tx), handle.engine_index(), &prefix)?
        else {
            return Ok(());
        };

        if let Some(replacing) = replacing {
            let found_key = handle.key_of_stored(found)?;
            if found_key.decode()? == replacing.decode()? {
                return Ok(());
            }
        }

        Err(IndexError::DuplicateKey {
            index: handle.name().to_owned(),
            space: self.space.name().to_owned(),
        })
    }
}
