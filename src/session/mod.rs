// ============================================================================
// Session
// ============================================================================
//
// One object for entity CRUD, either autocommitted or inside an explicit
// transaction. While Idle every call gets its own short-lived connection;
// begin_transaction pins one connection and transaction until commit or
// rollback.
//
// ============================================================================

pub mod config;
pub mod scope;

use crate::core::{DbError, Result};
use crate::interface::{ConnectionProvider, Mapper};
use crate::mapper::Entity;
use log::{debug, warn};
use std::fmt;
use uuid::Uuid;

pub use config::{AutocommitMode, SessionConfig};
pub use scope::ScopedConnection;

const TRANSACTION_ALREADY_OPEN: &str = "There is a transaction open already.";
const NO_TRANSACTION_OPEN: &str = "There is no transaction open.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InTransaction,
}

/// Runs a mapper call against the held transaction, or on a per-call
/// connection released before returning.
macro_rules! dispatch {
    ($session:ident, |$conn:ident, $tx:ident| $call:expr) => {{
        if let Some(scope) = $session.active.as_mut() {
            let ($conn, $tx) = scope.parts();
            $call
        } else {
            let mut scope = ScopedConnection::acquire(&$session.provider)?;
            if $session.config.autocommit == AutocommitMode::PerCallTransaction {
                if let Err(e) = scope.begin() {
                    return Err(scope.abandon(e));
                }
            }
            let outcome = {
                let ($conn, $tx) = scope.parts();
                $call
            };
            debug!("Session {} releasing autocommit connection", $session.id);
            scope.finish(outcome)
        }
    }};
}

macro_rules! dispatch_async {
    ($session:ident, |$conn:ident, $tx:ident| $call:expr) => {{
        if let Some(scope) = $session.active.as_mut() {
            let ($conn, $tx) = scope.parts();
            $call.await
        } else {
            let mut scope = ScopedConnection::acquire_async(&$session.provider).await?;
            if $session.config.autocommit == AutocommitMode::PerCallTransaction {
                if let Err(e) = scope.begin_async().await {
                    return Err(scope.abandon_async(e).await);
                }
            }
            let outcome = {
                let ($conn, $tx) = scope.parts();
                $call.await
            };
            debug!("Session {} releasing autocommit connection", $session.id);
            scope.finish_async(outcome).await
        }
    }};
}

/// Transactional session over a [`ConnectionProvider`] and a [`Mapper`].
///
/// ```
/// use dbsession::{ConnectionFactory, Entity, InMemoryDB, MemoryMapper, Session};
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Serialize, Deserialize)]
/// struct Person {
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl Entity for Person {
///     const TABLE: &'static str = "person";
///     fn id(&self) -> Option<i64> { self.id }
///     fn set_id(&mut self, id: i64) { self.id = Some(id); }
/// }
///
/// # fn main() -> dbsession::Result<()> {
/// let db = Arc::new(InMemoryDB::new());
/// db.execute("CREATE TABLE person (id INTEGER NOT NULL, name TEXT)")?;
///
/// let mut session = Session::new(ConnectionFactory::new(Arc::clone(&db)), MemoryMapper);
/// session.begin_transaction()?;
/// let mut john = Person { id: None, name: "John".into() };
/// session.insert(&mut john)?;
/// session.commit_transaction()?;
///
/// assert_eq!(john.id, Some(1));
/// assert_eq!(db.row_count("person")?, 1);
/// # Ok(())
/// # }
/// ```
pub struct Session<P: ConnectionProvider, M> {
    id: Uuid,
    provider: P,
    mapper: M,
    config: SessionConfig,
    active: Option<ScopedConnection<P::Connection>>,
}

impl<P, M> Session<P, M>
where
    P: ConnectionProvider,
    M: Mapper<Connection = P::Connection>,
{
    pub fn new(provider: P, mapper: M) -> Self {
        Self::with_config(provider, mapper, SessionConfig::default())
    }

    pub fn with_config(provider: P, mapper: M, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            mapper,
            config,
            active: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::InTransaction
        } else {
            SessionState::Idle
        }
    }

    pub fn is_in_transaction(&self) -> bool {
        self.active.is_some()
    }

    // --- transaction control ---

    /// Acquire a connection and start a transaction on it.
    ///
    /// Fails with [`DbError::InvalidOperation`] if a transaction is already
    /// open. When opening or beginning fails the connection is closed again
    /// and the session stays idle.
    pub fn begin_transaction(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Err(DbError::invalid_operation(TRANSACTION_ALREADY_OPEN));
        }

        let mut scope = ScopedConnection::acquire(&self.provider)?;
        if let Err(e) = scope.begin() {
            return Err(scope.abandon(e));
        }

        self.active = Some(scope);
        debug!("{} began a transaction", self);
        Ok(())
    }

    /// Commit and release. The session is idle afterwards even if the
    /// commit fails.
    pub fn commit_transaction(&mut self) -> Result<()> {
        let scope = self.take_active()?;
        debug!("{} committing", self);
        scope.commit()
    }

    pub fn rollback_transaction(&mut self) -> Result<()> {
        let scope = self.take_active()?;
        debug!("{} rolling back", self);
        scope.rollback()
    }

    pub async fn begin_transaction_async(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Err(DbError::invalid_operation(TRANSACTION_ALREADY_OPEN));
        }

        let mut scope = ScopedConnection::acquire_async(&self.provider).await?;
        if let Err(e) = scope.begin_async().await {
            return Err(scope.abandon_async(e).await);
        }

        self.active = Some(scope);
        debug!("{} began a transaction", self);
        Ok(())
    }

    pub async fn commit_transaction_async(&mut self) -> Result<()> {
        let scope = self.take_active()?;
        debug!("{} committing", self);
        scope.commit_async().await
    }

    pub async fn rollback_transaction_async(&mut self) -> Result<()> {
        let scope = self.take_active()?;
        debug!("{} rolling back", self);
        scope.rollback_async().await
    }

    fn take_active(&mut self) -> Result<ScopedConnection<P::Connection>> {
        self.active
            .take()
            .ok_or_else(|| DbError::invalid_operation(NO_TRANSACTION_OPEN))
    }

    // --- CRUD ---

    /// Insert `entity` and hand the generated key to [`Entity::set_id`].
    pub fn insert<E: Entity>(&mut self, entity: &mut E) -> Result<()> {
        let id = dispatch!(self, |conn, tx| self.mapper.insert(conn, &*entity, tx))?;
        entity.set_id(id);
        Ok(())
    }

    pub fn get<E: Entity>(&mut self, id: i64) -> Result<Option<E>> {
        dispatch!(self, |conn, tx| self.mapper.get::<E>(conn, id, tx))
    }

    pub fn update<E: Entity>(&mut self, entity: &E) -> Result<()> {
        dispatch!(self, |conn, tx| self.mapper.update(conn, entity, tx)).map(|_| ())
    }

    pub fn delete<E: Entity>(&mut self, entity: &E) -> Result<()> {
        dispatch!(self, |conn, tx| self.mapper.delete(conn, entity, tx)).map(|_| ())
    }

    /// Run a raw SELECT and map each row to `E`.
    pub fn query<E: Entity>(&mut self, sql: &str) -> Result<std::vec::IntoIter<E>> {
        dispatch!(self, |conn, tx| self.mapper.query::<E>(conn, sql, tx)).map(Vec::into_iter)
    }

    pub async fn insert_async<E: Entity>(&mut self, entity: &mut E) -> Result<()> {
        let id = dispatch_async!(self, |conn, tx| self.mapper.insert_async(conn, &*entity, tx))?;
        entity.set_id(id);
        Ok(())
    }

    pub async fn get_async<E: Entity>(&mut self, id: i64) -> Result<Option<E>> {
        dispatch_async!(self, |conn, tx| self.mapper.get_async(conn, id, tx))
    }

    pub async fn update_async<E: Entity>(&mut self, entity: &E) -> Result<()> {
        dispatch_async!(self, |conn, tx| self.mapper.update_async(conn, entity, tx)).map(|_| ())
    }

    pub async fn delete_async<E: Entity>(&mut self, entity: &E) -> Result<()> {
        dispatch_async!(self, |conn, tx| self.mapper.delete_async(conn, entity, tx)).map(|_| ())
    }

    pub async fn query_async<E: Entity>(&mut self, sql: &str) -> Result<std::vec::IntoIter<E>> {
        dispatch_async!(self, |conn, tx| self.mapper.query_async(conn, sql, tx))
            .map(Vec::into_iter)
    }

    // --- teardown ---

    /// Roll back any open transaction and close its connection, reporting
    /// errors that `Drop` could only log.
    pub fn close(mut self) -> Result<()> {
        match self.active.take() {
            Some(scope) => {
                debug!("{} closing with an open transaction, rolling back", self);
                scope.rollback()
            }
            None => Ok(()),
        }
    }

    pub async fn close_async(mut self) -> Result<()> {
        match self.active.take() {
            Some(scope) => {
                debug!("{} closing with an open transaction, rolling back", self);
                scope.rollback_async().await
            }
            None => Ok(()),
        }
    }
}

impl<P: ConnectionProvider, M> fmt::Display for Session<P, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.config.label {
            Some(label) => write!(f, "Session '{}' ({})", label, self.id),
            None => write!(f, "Session {}", self.id),
        }
    }
}

impl<P: ConnectionProvider, M> fmt::Debug for Session<P, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("in_transaction", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

impl<P: ConnectionProvider, M> Drop for Session<P, M> {
    fn drop(&mut self) {
        if let Some(scope) = self.active.take() {
            warn!("{} dropped with an open transaction, rolling back", self);
            if let Err(e) = scope.rollback() {
                warn!("{} rollback during drop failed: {}", self, e);
            }
        }
    }
}
