//! B-tree backed engine with optimistic concurrency control.
//!
//! Every index is a `BTreeMap` from decoded key parts to the stored value.
//! Transactions buffer their writes and record the key prefixes they read.
//! Prepare fails a transaction when any key it read or wrote was committed
//! by someone else after it began, or when another prepared transaction
//! writes the same key.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::iter::Peekable;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use tessera_tuple::{Key, KeyDef, Tuple, TupleError, UpdateOp, apply_ops, extract_key};
use tessera_types::{Lsn, Value};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::{EngineIndexId, KvEngine, Order, PrepareOutcome};

type Row = Vec<Value>;

/// Commit sequence number, private to the engine. Unlike LSNs it strictly
/// increases with every commit.
type CommitSeq = u64;

#[derive(Debug, Clone)]
struct PendingUpsert {
    tuple: Tuple,
    ops: Vec<UpdateOp>,
    index_base: u32,
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Put(Bytes),
    Delete,
    Upsert(Vec<PendingUpsert>),
}

impl PendingWrite {
    /// Value this write leaves behind on top of `base`.
    fn resolve(&self, comparator: &KeyDef, base: Option<&Bytes>) -> Result<Option<Bytes>> {
        match self {
            PendingWrite::Put(value) => Ok(Some(value.clone())),
            PendingWrite::Delete => Ok(None),
            PendingWrite::Upsert(chain) => {
                let mut current = base.cloned();
                for upsert in chain {
                    current = Some(apply_upsert(comparator, current.as_ref(), upsert)?);
                }
                Ok(current)
            }
        }
    }
}

/// Applies one upsert on top of `base`.
///
/// Operations that fail, or that would change the key, leave the old value
/// in place.
fn apply_upsert(comparator: &KeyDef, base: Option<&Bytes>, upsert: &PendingUpsert) -> Result<Bytes> {
    let Some(old) = base else {
        return Ok(upsert.tuple.as_bytes().clone());
    };

    let fields = Tuple::from_bytes(old.clone()).decode()?;
    let old_key = extract_key(&fields, comparator)?.decode()?;

    let patched = apply_ops(fields, &upsert.ops, upsert.index_base).and_then(|fields| {
        if extract_key(&fields, comparator)?.decode()? != old_key {
            return Err(TupleError::InvalidUpdate(
                "upsert must not modify the key".to_owned(),
            ));
        }
        Tuple::from_values(&fields)
    });

    match patched {
        Ok(tuple) => Ok(tuple.into_bytes()),
        Err(e) => {
            warn!(index = %comparator, error = %e, "upsert skipped, keeping old tuple");
            Ok(old.clone())
        }
    }
}

fn has_prefix(row: &[Value], prefix: &[Value]) -> bool {
    row.len() >= prefix.len() && row[..prefix.len()] == *prefix
}

/// Entries whose key starts with `prefix`, in key order.
fn with_prefix<'a, V>(
    map: &'a BTreeMap<Row, V>,
    prefix: &'a [Value],
) -> impl Iterator<Item = (&'a Row, &'a V)> + 'a {
    map.range::<[Value], _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(row, _)| has_prefix(row, prefix))
}

/// First visible value of a merged view of committed entries and pending
/// writes, both in key order.
fn first_visible<'a, C, P>(
    comparator: &KeyDef,
    mut committed: Peekable<C>,
    mut pending: Peekable<P>,
) -> Result<Option<Bytes>>
where
    C: Iterator<Item = (&'a Row, &'a Bytes)>,
    P: Iterator<Item = (&'a Row, &'a PendingWrite)>,
{
    loop {
        let next_committed = committed.peek().map(|(row, _)| *row);
        let next_pending = pending.peek().map(|(row, _)| *row);

        let step = match (next_committed, next_pending) {
            (None, None) => return Ok(None),
            (Some(_), None) => committed.next().map(|(_, value)| value.clone()),
            (None, Some(_)) => match pending.next() {
                Some((_, write)) => write.resolve(comparator, None)?,
                None => None,
            },
            (Some(c), Some(p)) => match c.cmp(p) {
                Ordering::Less => committed.next().map(|(_, value)| value.clone()),
                Ordering::Greater => match pending.next() {
                    Some((_, write)) => write.resolve(comparator, None)?,
                    None => None,
                },
                Ordering::Equal => {
                    let base = committed.next().map(|(_, value)| value);
                    match pending.next() {
                        Some((_, write)) => write.resolve(comparator, base)?,
                        None => None,
                    }
                }
            },
        };

        if step.is_some() {
            return Ok(step);
        }
    }
}

#[derive(Debug)]
struct IndexState {
    comparator: KeyDef,
    entries: BTreeMap<Row, Bytes>,
    versions: BTreeMap<Row, CommitSeq>,
    bsize: u64,
}

impl IndexState {
    fn new(comparator: KeyDef) -> Self {
        Self {
            comparator,
            entries: BTreeMap::new(),
            versions: BTreeMap::new(),
            bsize: 0,
        }
    }

    fn store(&mut self, row: Row, value: Option<Bytes>, seq: CommitSeq) {
        let old = match value {
            Some(value) => {
                self.bsize += value.len() as u64;
                self.entries.insert(row.clone(), value)
            }
            None => self.entries.remove(&row),
        };
        if let Some(old) = old {
            self.bsize -= old.len() as u64;
        }
        self.versions.insert(row, seq);
    }
}

#[derive(Debug)]
struct EngineState {
    indexes: HashMap<EngineIndexId, IndexState>,
    next_index: u32,
    commit_seq: CommitSeq,
    last_lsn: Lsn,
    prepared: HashMap<u64, Vec<(EngineIndexId, Row)>>,
}

impl EngineState {
    fn index(&self, index: EngineIndexId) -> Result<&IndexState> {
        self.indexes
            .get(&index)
            .ok_or(EngineError::UnknownIndex(index))
    }

    fn index_mut(&mut self, index: EngineIndexId) -> Result<&mut IndexState> {
        self.indexes
            .get_mut(&index)
            .ok_or(EngineError::UnknownIndex(index))
    }

    /// Applies the writes of a prepared transaction. Every write is resolved
    /// before any index changes, so an error leaves the state untouched.
    fn apply(&mut self, tx: &MemoryTx, lsn: Lsn) -> Result<()> {
        if lsn < self.last_lsn {
            return Err(EngineError::NonMonotonicLsn {
                lsn,
                last: self.last_lsn,
            });
        }

        let mut resolved = Vec::with_capacity(tx.write_count());
        for (index, writes) in &tx.writes {
            let target = self.index(*index)?;
            for (row, write) in writes {
                let value = write.resolve(&target.comparator, target.entries.get(row))?;
                resolved.push((*index, row.clone(), value));
            }
        }

        self.commit_seq += 1;
        let seq = self.commit_seq;
        for (index, row, value) in resolved {
            self.index_mut(index)?.store(row, value, seq);
        }
        self.last_lsn = lsn;
        Ok(())
    }

    /// Returns a description of the first conflict `tx` runs into.
    fn find_conflict(&self, tx: &MemoryTx) -> Result<Option<String>> {
        for (index, prefix) in tx.reads.borrow().iter() {
            let state = self.index(*index)?;
            if with_prefix(&state.versions, prefix).any(|(_, seq)| *seq > tx.read_view) {
                return Ok(Some(format!("read of {index} changed")));
            }
        }

        for (index, writes) in &tx.writes {
            let state = self.index(*index)?;
            for row in writes.keys() {
                if state.versions.get(row).is_some_and(|seq| *seq > tx.read_view) {
                    return Ok(Some(format!("write to {index} overwritten")));
                }
                let claimed = self.prepared.iter().any(|(other, keys)| {
                    *other != tx.id && keys.iter().any(|(i, r)| i == index && r == row)
                });
                if claimed {
                    return Ok(Some(format!("write to {index} held by a prepared transaction")));
                }
            }
        }
        Ok(None)
    }
}

/// A transaction of [`MemoryEngine`].
#[derive(Debug)]
pub struct MemoryTx {
    id: u64,
    read_view: CommitSeq,
    reads: RefCell<Vec<(EngineIndexId, Row)>>,
    writes: BTreeMap<EngineIndexId, BTreeMap<Row, PendingWrite>>,
    prepared: bool,
}

impl MemoryTx {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of buffered writes across all indexes.
    pub fn write_count(&self) -> usize {
        self.writes.values().map(BTreeMap::len).sum()
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn pending_mut(&mut self, index: EngineIndexId) -> &mut BTreeMap<Row, PendingWrite> {
        self.writes.entry(index).or_default()
    }

    fn written_keys(&self) -> Vec<(EngineIndexId, Row)> {
        self.writes
            .iter()
            .flat_map(|(index, writes)| writes.keys().map(|row| (*index, row.clone())))
            .collect()
    }
}

/// A cursor of [`MemoryEngine`] over a snapshot of committed entries.
#[derive(Debug)]
pub struct MemoryCursor {
    index: EngineIndexId,
    values: std::vec::IntoIter<Bytes>,
}

impl MemoryCursor {
    pub fn index(&self) -> EngineIndexId {
        self.index
    }
}

/// In-memory [`KvEngine`].
///
/// Nothing is persisted; LSNs passed to commit are only checked for
/// monotonicity.
#[derive(Debug)]
pub struct MemoryEngine {
    state: RwLock<EngineState>,
    next_tx: AtomicU64,
    open_cursors: AtomicUsize,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EngineState {
                indexes: HashMap::new(),
                next_index: 0,
                commit_seq: 0,
                last_lsn: Lsn::ZERO,
                prepared: HashMap::new(),
            }),
            next_tx: AtomicU64::new(1),
            open_cursors: AtomicUsize::new(0),
        }
    }

    /// Number of cursors opened and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(AtomicOrdering::Acquire)
    }

    /// LSN of the last commit.
    pub fn last_lsn(&self) -> Result<Lsn> {
        Ok(self.read_state()?.last_lsn)
    }

    /// Number of committed entries in an index.
    pub fn index_len(&self, index: EngineIndexId) -> Result<usize> {
        Ok(self.read_state()?.index(index)?.entries.len())
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, EngineState>> {
        self.state.read().map_err(|_| EngineError::LockPoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, EngineState>> {
        self.state.write().map_err(|_| EngineError::LockPoisoned)
    }

    fn comparator(&self, index: EngineIndexId) -> Result<KeyDef> {
        Ok(self.read_state()?.index(index)?.comparator.clone())
    }
}

impl KvEngine for MemoryEngine {
    type Tx = MemoryTx;
    type Cursor = MemoryCursor;

    fn open_index(&self, comparator: &KeyDef) -> Result<EngineIndexId> {
        let mut state = self.write_state()?;
        let id = EngineIndexId::new(state.next_index);
        state.next_index += 1;
        state.indexes.insert(id, IndexState::new(comparator.clone()));
        debug!(index = %id, comparator = %comparator, "opened engine index");
        Ok(id)
    }

    fn drop_index(&self, index: EngineIndexId) -> Result<()> {
        let mut state = self.write_state()?;
        state
            .indexes
            .remove(&index)
            .ok_or(EngineError::UnknownIndex(index))?;
        debug!(index = %index, "dropped engine index");
        Ok(())
    }

    fn begin(&self) -> Result<MemoryTx> {
        let read_view = self.read_state()?.commit_seq;
        Ok(MemoryTx {
            id: self.next_tx.fetch_add(1, AtomicOrdering::Relaxed),
            read_view,
            reads: RefCell::new(Vec::new()),
            writes: BTreeMap::new(),
            prepared: false,
        })
    }

    fn prepare(&self, tx: &mut MemoryTx) -> Result<PrepareOutcome> {
        let mut state = self.write_state()?;
        if let Some(reason) = state.find_conflict(tx)? {
            debug!(tx = tx.id, reason = %reason, "transaction conflict");
            return Ok(PrepareOutcome::Conflict);
        }
        state.prepared.insert(tx.id, tx.written_keys());
        tx.prepared = true;
        Ok(PrepareOutcome::Ok)
    }

    fn commit(&self, tx: MemoryTx, lsn: Lsn) -> Result<()> {
        let mut state = self.write_state()?;
        if !tx.prepared {
            return Err(EngineError::NotPrepared(tx.id));
        }

        // A failed commit is a rollback: the prepared claim goes either way.
        let applied = state.apply(&tx, lsn);
        state.prepared.remove(&tx.id);
        if let Err(e) = &applied {
            warn!(tx = tx.id, lsn = %lsn, error = %e, "commit failed, transaction rolled back");
        }
        applied?;

        debug!(tx = tx.id, lsn = %lsn, writes = tx.write_count(), "committed transaction");
        Ok(())
    }

    fn rollback(&self, tx: MemoryTx) {
        match self.write_state() {
            Ok(mut state) => {
                state.prepared.remove(&tx.id);
            }
            Err(e) => warn!(tx = tx.id, error = %e, "rollback could not release prepared writes"),
        }
        debug!(tx = tx.id, "rolled back transaction");
    }

    fn get(&self, tx: Option<&MemoryTx>, index: EngineIndexId, key: &Key) -> Result<Option<Bytes>> {
        let prefix = key.decode()?;
        let state = self.read_state()?;
        let target = state.index(index)?;

        if let Some(tx) = tx {
            tx.reads.borrow_mut().push((index, prefix.clone()));
        }

        let committed = with_prefix(&target.entries, &prefix).peekable();
        let pending = tx
            .and_then(|tx| tx.writes.get(&index))
            .into_iter()
            .flat_map(|writes| with_prefix(writes, &prefix))
            .peekable();

        first_visible(&target.comparator, committed, pending)
    }

    fn put(&self, tx: &mut MemoryTx, index: EngineIndexId, key: &Key, value: Bytes) -> Result<()> {
        self.read_state()?.index(index)?;
        let row = key.decode()?;
        tx.pending_mut(index).insert(row, PendingWrite::Put(value));
        Ok(())
    }

    fn delete(&self, tx: &mut MemoryTx, index: EngineIndexId, key: &Key) -> Result<()> {
        self.read_state()?.index(index)?;
        let row = key.decode()?;
        tx.pending_mut(index).insert(row, PendingWrite::Delete);
        Ok(())
    }

    fn upsert(
        &self,
        tx: &mut MemoryTx,
        index: EngineIndexId,
        tuple: &Tuple,
        ops: &[UpdateOp],
        index_base: u32,
    ) -> Result<()> {
        let comparator = self.comparator(index)?;
        let row = extract_key(&tuple.decode()?, &comparator)?.decode()?;
        let upsert = PendingUpsert {
            tuple: tuple.clone(),
            ops: ops.to_vec(),
            index_base,
        };

        let pending = tx.pending_mut(index);
        let next = match pending.remove(&row) {
            None => PendingWrite::Upsert(vec![upsert]),
            Some(PendingWrite::Upsert(mut chain)) => {
                chain.push(upsert);
                PendingWrite::Upsert(chain)
            }
            Some(PendingWrite::Put(value)) => {
                PendingWrite::Put(apply_upsert(&comparator, Some(&value), &upsert)?)
            }
            Some(PendingWrite::Delete) => PendingWrite::Put(tuple.as_bytes().clone()),
        };
        pending.insert(row, next);
        Ok(())
    }

    fn cursor(&self, index: EngineIndexId, key: &Key, order: Order) -> Result<MemoryCursor> {
        let prefix = key.decode()?;
        let state = self.read_state()?;
        let entries = &state.index(index)?.entries;
        let prefix = prefix.as_slice();

        let values: Vec<Bytes> = match order {
            Order::Ge => entries
                .range::<[Value], _>((Bound::Included(prefix), Bound::Unbounded))
                .map(|(_, value)| value.clone())
                .collect(),
            Order::Gt => entries
                .range::<[Value], _>((Bound::Included(prefix), Bound::Unbounded))
                .skip_while(|(row, _)| has_prefix(row, prefix))
                .map(|(_, value)| value.clone())
                .collect(),
            Order::Le => entries
                .iter()
                .rev()
                .skip_while(|(row, _)| row.as_slice() > prefix && !has_prefix(row, prefix))
                .map(|(_, value)| value.clone())
                .collect(),
            Order::Lt => entries
                .range::<[Value], _>((Bound::Unbounded, Bound::Excluded(prefix)))
                .rev()
                .map(|(_, value)| value.clone())
                .collect(),
        };

        self.open_cursors.fetch_add(1, AtomicOrdering::AcqRel);
        Ok(MemoryCursor {
            index,
            values: values.into_iter(),
        })
    }

    fn cursor_next(&self, cursor: &mut MemoryCursor) -> Result<Option<Bytes>> {
        Ok(cursor.values.next())
    }

    fn cursor_close(&self, cursor: MemoryCursor) {
        drop(cursor);
        self.open_cursors.fetch_sub(1, AtomicOrdering::AcqRel);
    }

    fn index_bsize(&self, index: EngineIndexId) -> Result<u64> {
        Ok(self.read_state()?.index(index)?.bsize)
    }
}
