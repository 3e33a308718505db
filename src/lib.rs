// ============================================================================
// dbsession Library
// ============================================================================
//
// A transactional session over pluggable connection, transaction and mapper
// traits, plus an in-memory backend implementing them.
//
// ============================================================================

pub mod connection;
pub mod core;
pub mod facade;
pub mod interface;
pub mod mapper;
pub mod result;
pub mod session;
pub mod storage;
pub mod transaction;
mod executor;
mod parser;

// Re-export main types for convenience
pub use core::{DataType, DbError, Result, Value};
pub use facade::InMemoryDB;
pub use result::QueryResult;

// Re-export the collaborator traits
pub use interface::{
    ConnectionProvider, ConnectionState, DbConnection, DbTransaction, Mapper, TransactionOf,
};

// Re-export the in-memory backend
pub use connection::{Connection, ConnectionConfig, ConnectionFactory};
pub use mapper::{Entity, MemoryMapper};
pub use transaction::Transaction;

// Re-export the session API
pub use session::{AutocommitMode, Session, SessionConfig, SessionState};

/// Session over the in-memory backend.
pub type MemorySession = Session<ConnectionFactory, MemoryMapper>;

impl MemorySession {
    /// Session with default settings over `db`.
    ///
    /// ```
    /// use dbsession::{InMemoryDB, MemorySession, SessionState};
    /// use std::sync::Arc;
    ///
    /// let session = MemorySession::in_memory(Arc::new(InMemoryDB::new()));
    /// assert_eq!(session.state(), SessionState::Idle);
    /// ```
    pub fn in_memory(db: std::sync::Arc<InMemoryDB>) -> Self {
        Session::new(ConnectionFactory::new(db), MemoryMapper)
    }
}
