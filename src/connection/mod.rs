pub mod config;
pub mod factory;

use crate::core::{DbError, Result};
use crate::facade::InMemoryDB;
use crate::interface::{ConnectionState, DbConnection};
use crate::result::QueryResult;
use crate::transaction::Transaction;
use log::debug;
use std::sync::Arc;

pub use config::ConnectionConfig;
pub use factory::ConnectionFactory;

/// Connection handle onto an [`InMemoryDB`].
///
/// Created closed. Dropping an open connection closes it.
#[derive(Debug)]
pub struct Connection {
    /// Unique connection ID
    id: u64,
    /// Database label from the factory config
    database: String,
    db: Arc<InMemoryDB>,
    state: ConnectionState,
}

impl Connection {
    pub(crate) fn new(db: Arc<InMemoryDB>, database: &str) -> Self {
        Self {
            id: db.next_connection_id(),
            database: database.to_string(),
            db,
            state: ConnectionState::Closed,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    pub(crate) fn db(&self) -> &Arc<InMemoryDB> {
        &self.db
    }

    /// Run SQL outside any transaction.
    ///
    /// ```ignore
    /// conn.execute("CREATE TABLE person (id INTEGER, name TEXT)")?;
    /// let result = conn.execute("SELECT * FROM person")?;
    /// ```
    pub fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        self.ensure_open()?;
        self.db.execute(sql)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DbError::ExecutionError(format!(
                "Connection {} is closed",
                self.id
            )))
        }
    }
}

impl DbConnection for Connection {
    type Transaction = Transaction;

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(DbError::invalid_operation(format!(
                "Connection {} is already open",
                self.id
            )));
        }

        self.state = ConnectionState::Open;
        self.db.connection_opened();
        debug!("Connection {} opened on '{}'", self.id, self.database);
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<Transaction> {
        self.ensure_open()?;
        Ok(Transaction::begin(Arc::clone(&self.db), self.id))
    }

    fn close(&mut self) -> Result<()> {
        if self.is_open() {
            self.state = ConnectionState::Closed;
            self.db.connection_closed();
            debug!("Connection {} closed", self.id);
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
