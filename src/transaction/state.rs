// ============================================================================
// Transaction State Management
// ============================================================================
//
// Each transaction moves through Active -> Committed/Aborted. Writes are
// buffered as Changes and only reach storage on commit, so other connections
// read committed data only.
//
// ============================================================================

use super::Change;
use crate::core::{DbError, Result};
use crate::facade::InMemoryDB;
use crate::interface::DbTransaction;
use log::{debug, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Transaction on an in-memory [`Connection`](crate::connection::Connection).
///
/// Dropping an active transaction aborts it.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    connection_id: u64,
    state: TransactionState,
    changes: Vec<Change>,
    db: Arc<InMemoryDB>,
}

impl Transaction {
    pub(crate) fn begin(db: Arc<InMemoryDB>, connection_id: u64) -> Self {
        db.transaction_started();
        let id = TransactionId::new();
        debug!("{} started on connection {}", id, connection_id);

        Self {
            id,
            connection_id,
            state: TransactionState::Active,
            changes: Vec::new(),
            db,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Connection this transaction is bound to.
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub(crate) fn record(&mut self, change: Change) -> Result<()> {
        if !self.state.is_active() {
            return Err(DbError::ExecutionError(format!(
                "{} is {}",
                self.id, self.state
            )));
        }
        self.changes.push(change);
        Ok(())
    }

    /// Abort and hand the keys reserved by buffered inserts back to storage.
    fn abort(&mut self) -> Result<()> {
        let released = self.db.release_keys(&self.changes);
        self.changes.clear();
        self.finish(TransactionState::Aborted);
        released
    }

    fn finish(&mut self, state: TransactionState) {
        if self.state.is_active() {
            self.state = state;
            self.db.transaction_finished();
        }
    }
}

impl DbTransaction for Transaction {
    fn commit(mut self) -> Result<()> {
        let applied = self.db.apply(&self.changes);
        match applied {
            Ok(()) => {
                debug!("{} committed {} change(s)", self.id, self.changes.len());
                self.finish(TransactionState::Committed);
                Ok(())
            }
            Err(e) => {
                if let Err(other) = self.abort() {
                    warn!("{} could not release reserved keys: {}", self.id, other);
                }
                Err(e)
            }
        }
    }

    fn rollback(mut self) -> Result<()> {
        debug!("{} rolled back, discarding {} change(s)", self.id, self.changes.len());
        self.abort()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state.is_active() {
            debug!("{} dropped while active, aborting", self.id);
            if let Err(e) = self.abort() {
                warn!("{} could not release reserved keys: {}", self.id, e);
            }
        }
    }
}
