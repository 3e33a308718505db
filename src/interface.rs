use async_trait::async_trait;
use std::sync::Arc;
use crate::core::Result;
use crate::mapper::Entity;

/// Open/closed state of a connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Transaction handle produced by a [`DbConnection`].
///
/// `commit` and `rollback` consume the handle, so a transaction ends exactly once.
/// Dropping an unfinished handle must discard its work.
#[async_trait]
pub trait DbTransaction: Send + Sized {
    fn commit(self) -> Result<()>;

    fn rollback(self) -> Result<()>;

    async fn commit_async(self) -> Result<()> {
        self.commit()
    }

    async fn rollback_async(self) -> Result<()> {
        self.rollback()
    }
}

/// A database connection handle.
///
/// Handles may be handed out open (pooled) or closed (fresh); callers check
/// [`DbConnection::state`] before calling [`DbConnection::open`].
#[async_trait]
pub trait DbConnection: Send {
    type Transaction: DbTransaction;

    fn state(&self) -> ConnectionState;

    fn open(&mut self) -> Result<()>;

    fn begin_transaction(&mut self) -> Result<Self::Transaction>;

    fn close(&mut self) -> Result<()>;

    async fn open_async(&mut self) -> Result<()> {
        self.open()
    }

    async fn begin_transaction_async(&mut self) -> Result<Self::Transaction> {
        self.begin_transaction()
    }

    async fn close_async(&mut self) -> Result<()> {
        self.close()
    }
}

/// Transaction type of a connection type.
pub type TransactionOf<C> = <C as DbConnection>::Transaction;

/// Supplies connection handles on demand.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    type Connection: DbConnection;

    fn get_connection(&self) -> Result<Self::Connection>;

    async fn get_connection_async(&self) -> Result<Self::Connection> {
        self.get_connection()
    }
}

#[async_trait]
impl<P: ConnectionProvider> ConnectionProvider for Arc<P> {
    type Connection = P::Connection;

    fn get_connection(&self) -> Result<Self::Connection> {
        (**self).get_connection()
    }

    async fn get_connection_async(&self) -> Result<Self::Connection> {
        (**self).get_connection_async().await
    }
}

/// Entity CRUD and raw queries against a connection.
///
/// Every operation takes an optional transaction handle. With a handle the
/// work joins that transaction; without one it runs on the connection
/// directly. The `_async` forms default to the blocking ones; drivers doing
/// real I/O override them.
#[async_trait]
pub trait Mapper: Send + Sync {
    type Connection: DbConnection;

    fn get<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        id: i64,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<Option<E>>;

    /// Returns the key generated for the new row.
    fn insert<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        entity: &E,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<i64>;

    /// Returns whether a row was updated.
    fn update<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        entity: &E,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<bool>;

    /// Returns whether a row was deleted.
    fn delete<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        entity: &E,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<bool>;

    fn query<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<Vec<E>>;

    async fn get_async<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        id: i64,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<Option<E>> {
        self.get(connection, id, transaction)
    }

    async fn insert_async<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        entity: &E,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<i64> {
        self.insert(connection, entity, transaction)
    }

    async fn update_async<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        entity: &E,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<bool> {
        self.update(connection, entity, transaction)
    }

    async fn delete_async<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        entity: &E,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<bool> {
        self.delete(connection, entity, transaction)
    }

    async fn query_async<E: Entity>(
        &self,
        connection: &mut Self::Connection,
        sql: &str,
        transaction: Option<&mut TransactionOf<Self::Connection>>,
    ) -> Result<Vec<E>> {
        self.query(connection, sql, transaction)
    }
}
