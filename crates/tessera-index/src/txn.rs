//! Transaction context.

use std::sync::Arc;

use tessera_engine::{KvEngine, PrepareOutcome};
use tessera_types::Lsn;
use tracing::{debug, warn};

use crate::error::{IndexError, Result};

/// One logical user transaction wrapping exactly one engine transaction.
///
/// Every statement of the transaction must be executed through the same
/// context. A context dropped without [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) is rolled back.
pub struct TransactionContext<E: KvEngine> {
    engine: Arc<E>,
    tx: Option<E::Tx>,
}

impl<E: KvEngine> TransactionContext<E> {
    /// Begins an engine transaction.
    pub fn begin(engine: Arc<E>) -> Result<Self> {
        let tx = engine.begin()?;
        Ok(Self {
            engine,
            tx: Some(tx),
        })
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub(crate) fn engine_tx(&self) -> Result<&E::Tx> {
        self.tx.as_ref().ok_or_else(finished)
    }

    pub(crate) fn engine_tx_mut(&mut self) -> Result<&mut E::Tx> {
        self.tx.as_mut().ok_or_else(finished)
    }

    /// Prepares and commits at `lsn`.
    ///
    /// A conflict at prepare rolls the transaction back and returns
    /// [`IndexError::TransactionConflict`]. A prepare failure rolls back and
    /// propagates the engine error.
    pub fn commit(mut self, lsn: Lsn) -> Result<()> {
        let mut tx = self.tx.take().ok_or_else(finished)?;
        match self.engine.prepare(&mut tx) {
            Ok(PrepareOutcome::Ok) => {
                self.engine.commit(tx, lsn)?;
                debug!(lsn = %lsn, "transaction committed");
                Ok(())
            }
            Ok(PrepareOutcome::Conflict) => {
                warn!(lsn = %lsn, "transaction conflict at prepare, rolling back");
                self.engine.rollback(tx);
                Err(IndexError::TransactionConflict)
            }
            Err(e) => {
                warn!(error = %e, "prepare failed, rolling back");
                self.engine.rollback(tx);
                Err(e.into())
            }
        }
    }

    /// Discards every write of the transaction.
    pub fn rollback(mut self) {
        if let Some(tx) = self.tx.take() {
            self.engine.rollback(tx);
        }
    }
}

impl<E: KvEngine> Drop for TransactionContext<E> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            warn!("transaction dropped without commit, rolling back");
            self.engine.rollback(tx);
        }
    }
}

fn finished() -> IndexError {
    IndexError::Validation("transaction is already finished".to_owned())
}
