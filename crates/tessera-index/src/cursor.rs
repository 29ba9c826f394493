//! Index cursors.
//!
//! ```text
//! Created --init--> PointLookup --next--> Exhausted
//!    |
//!    +----init----> Scan --next--> Scan
//!                    |
//!                    +--next (end, mismatch, schema change, error)--> Exhausted
//! ```
//!
//! A scan snapshots the schema version at init and ends as soon as the
//! version moves. The engine cursor is released exactly once, on the
//! transition to `Exhausted`, on re-init, or on drop.

use std::cmp::Ordering;

use tessera_engine::{KvEngine, Order};
use tessera_tuple::{Key, Tuple, compare_with_key, validate_key};
use tessera_types::{SchemaVersion, Value};
use tracing::debug;

use crate::error::{IndexError, Result};
use crate::space::IndexRef;

/// Requested scan type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IteratorType {
    /// Every tuple, ascending.
    All,
    /// Tuples equal to the key, ascending.
    Eq,
    /// Tuples equal to the key, descending.
    Req,
    /// Tuples greater than the key, ascending.
    Gt,
    /// Tuples greater than or equal to the key, ascending.
    Ge,
    /// Tuples less than the key, descending.
    Lt,
    /// Tuples less than or equal to the key, descending.
    Le,
}

impl IteratorType {
    /// Engine order for a scan from a key with `key_parts` parts.
    pub fn engine_order(self, key_parts: usize) -> Order {
        match self {
            IteratorType::All | IteratorType::Ge | IteratorType::Eq => Order::Ge,
            IteratorType::Gt if key_parts == 0 => Order::Ge,
            IteratorType::Gt => Order::Gt,
            IteratorType::Lt if key_parts == 0 => Order::Le,
            IteratorType::Lt => Order::Lt,
            IteratorType::Le | IteratorType::Req => Order::Le,
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, IteratorType::Eq | IteratorType::Req)
    }
}

struct ScanState<C> {
    engine_cursor: C,
    equals: Option<Vec<Value>>,
    schema_version: SchemaVersion,
}

enum CursorState<C> {
    Created,
    PointLookup {
        key: Key,
        schema_version: SchemaVersion,
    },
    Scan(ScanState<C>),
    Exhausted,
}

/// A scan over one index.
pub struct IndexCursor<'a, E: KvEngine> {
    index: IndexRef<'a, E>,
    state: CursorState<E::Cursor>,
}

impl<'a, E: KvEngine> IndexCursor<'a, E> {
    pub(crate) fn new(index: IndexRef<'a, E>) -> Self {
        Self {
            index,
            state: CursorState::Created,
        }
    }

    /// Positions the cursor. Any previous scan is released first.
    pub fn init(&mut self, iterator_type: IteratorType, key: &Key) -> Result<()> {
        self.release();

        let handle = self.index.handle();
        let parts = key.decode()?;
        validate_key(handle.key_def(), &parts, false)?;
        let schema_version = self.index.space().schema_version();

        if iterator_type.is_equality()
            && handle.is_unique()
            && parts.len() == handle.key_def().part_count()
        {
            self.state = CursorState::PointLookup {
                key: key.clone(),
                schema_version,
            };
            return Ok(());
        }

        let order = iterator_type.engine_order(parts.len());
        let engine_cursor = self
            .index
            .space()
            .engine()
            .cursor(handle.engine_index(), key, order)?;
        self.state = CursorState::Scan(ScanState {
            engine_cursor,
            equals: iterator_type.is_equality().then_some(parts),
            schema_version,
        });
        Ok(())
    }

    /// Returns `true` if the next call is served by a single point lookup.
    pub fn is_point_lookup(&self) -> bool {
        matches!(self.state, CursorState::PointLookup { .. })
    }

    /// Returns `true` once the scan has ended.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, CursorState::Exhausted)
    }

    /// Returns the next full tuple, or `None` at the end of the scan.
    #[allow(clippy::should_implement_trait)] // fallible, so not an Iterator
    pub fn next(&mut self) -> Result<Option<Tuple>> {
        match std::mem::replace(&mut self.state, CursorState::Exhausted) {
            CursorState::Created => {
                self.state = CursorState::Created;
                Err(IndexError::Validation(
                    "cursor is not initialized".to_owned(),
                ))
            }
            CursorState::Exhausted => Ok(None),
            CursorState::PointLookup {
                key,
                schema_version,
            } => {
                if self.schema_changed(schema_version) {
                    debug!(index = %self.index.handle().key_def(), "cursor stopped by schema change");
                    return Ok(None);
                }
                self.index.lookup(None, &key)
            }
            CursorState::Scan(mut scan) => match self.advance(&mut scan) {
                Ok(Some(tuple)) => {
                    self.state = CursorState::Scan(scan);
                    Ok(Some(tuple))
                }
                Ok(None) => {
                    self.close(scan);
                    Ok(None)
                }
                Err(e) => {
                    self.close(scan);
                    Err(e)
                }
            },
        }
    }

    /// Releases the engine cursor. Idempotent.
    pub fn release(&mut self) {
        if let CursorState::Scan(scan) = std::mem::replace(&mut self.state, CursorState::Exhausted)
        {
            self.close(scan);
        }
    }

    fn advance(&self, scan: &mut ScanState<E::Cursor>) -> Result<Option<Tuple>> {
        let engine = self.index.space().engine();
        let handle = self.index.handle();
        loop {
            let candidate = engine.cursor_next(&mut scan.engine_cursor)?;
            if self.schema_changed(scan.schema_version) {
                debug!(index = %handle.key_def(), "cursor stopped by schema change");
                return Ok(None);
            }
            let Some(bytes) = candidate else {
                debug!(index = %handle.key_def(), "cursor exhausted");
                return Ok(None);
            };

            let stored = Tuple::from_bytes(bytes);
            if let Some(key) = &scan.equals {
                let fields = stored.decode()?;
                if compare_with_key(&fields, key, handle.comparator()) != Ordering::Equal {
                    debug!(index = %handle.key_def(), "cursor stopped at first non-matching key");
                    return Ok(None);
                }
            }

            // A secondary entry whose primary tuple is gone is skipped.
            if let Some(tuple) = self.index.resolve(None, stored)? {
                return Ok(Some(tuple));
            }
        }
    }

    fn close(&self, scan: ScanState<E::Cursor>) {
        self.index
            .space()
            .engine()
            .cursor_close(scan.engine_cursor);
    }

    fn schema_changed(&self, snapshot: SchemaVersion) -> bool {
        self.index.space().schema_version() != snapshot
    }
}

impl<E: KvEngine> Drop for IndexCursor<'_, E> {
    fn drop(&mut self) {
        self.release();
    }
}
