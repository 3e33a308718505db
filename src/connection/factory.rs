use super::Connection;
use super::config::ConnectionConfig;
use crate::core::Result;
use crate::facade::InMemoryDB;
use crate::interface::{ConnectionProvider, DbConnection};
use std::sync::Arc;

/// [`ConnectionProvider`] over a shared [`InMemoryDB`].
///
/// Every call returns a new handle; there is no pooling.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    db: Arc<InMemoryDB>,
    config: ConnectionConfig,
}

impl ConnectionFactory {
    pub fn new(db: Arc<InMemoryDB>) -> Self {
        Self::with_config(db, ConnectionConfig::default())
    }

    pub fn with_config(db: Arc<InMemoryDB>, config: ConnectionConfig) -> Self {
        Self { db, config }
    }

    pub fn database(&self) -> &Arc<InMemoryDB> {
        &self.db
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl ConnectionProvider for ConnectionFactory {
    type Connection = Connection;

    fn get_connection(&self) -> Result<Connection> {
        let mut conn = Connection::new(Arc::clone(&self.db), &self.config.database);
        if self.config.open_on_acquire {
            conn.open()?;
        }
        Ok(conn)
    }
}
