use crate::core::{DbError, Result};
use crate::interface::{ConnectionProvider, DbConnection, DbTransaction, TransactionOf};
use log::warn;

/// A connection and the transaction running on it, released together.
///
/// Dropping an unreleased scope rolls back the transaction and closes the
/// connection, so early returns and panics cannot leak either.
pub struct ScopedConnection<C: DbConnection> {
    connection: C,
    transaction: Option<TransactionOf<C>>,
    released: bool,
}

impl<C: DbConnection> ScopedConnection<C> {
    fn new(connection: C) -> Self {
        Self {
            connection,
            transaction: None,
            released: false,
        }
    }

    /// Take a connection from `provider`, opening it unless it already is.
    pub fn acquire<P>(provider: &P) -> Result<Self>
    where
        P: ConnectionProvider<Connection = C>,
    {
        let mut scope = Self::new(provider.get_connection()?);
        if !scope.connection.state().is_open() {
            if let Err(e) = scope.connection.open() {
                return Err(scope.abandon(e));
            }
        }
        Ok(scope)
    }

    pub async fn acquire_async<P>(provider: &P) -> Result<Self>
    where
        P: ConnectionProvider<Connection = C>,
    {
        let mut scope = Self::new(provider.get_connection_async().await?);
        if !scope.connection.state().is_open() {
            if let Err(e) = scope.connection.open_async().await {
                return Err(scope.abandon_async(e).await);
            }
        }
        Ok(scope)
    }

    pub fn begin(&mut self) -> Result<()> {
        let transaction = self.connection.begin_transaction()?;
        self.transaction = Some(transaction);
        Ok(())
    }

    pub async fn begin_async(&mut self) -> Result<()> {
        let transaction = self.connection.begin_transaction_async().await?;
        self.transaction = Some(transaction);
        Ok(())
    }

    pub fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// The connection and, when one is running, its transaction.
    pub fn parts(&mut self) -> (&mut C, Option<&mut TransactionOf<C>>) {
        (&mut self.connection, self.transaction.as_mut())
    }

    /// Commit the transaction, if any, then close the connection.
    pub fn commit(mut self) -> Result<()> {
        self.end(true)
    }

    /// Roll back the transaction, if any, then close the connection.
    pub fn rollback(mut self) -> Result<()> {
        self.end(false)
    }

    pub async fn commit_async(mut self) -> Result<()> {
        self.end_async(true).await
    }

    pub async fn rollback_async(mut self) -> Result<()> {
        self.end_async(false).await
    }

    /// End the scope according to `outcome`: commit on success, roll back on
    /// failure. The outcome's own error wins over a release error.
    pub fn finish<T>(mut self, outcome: Result<T>) -> Result<T> {
        let ended = self.end(outcome.is_ok());
        settle(outcome, ended)
    }

    pub async fn finish_async<T>(mut self, outcome: Result<T>) -> Result<T> {
        let ended = self.end_async(outcome.is_ok()).await;
        settle(outcome, ended)
    }

    /// Release after a failed setup step and hand back that step's error.
    pub fn abandon(mut self, err: DbError) -> DbError {
        if let Err(cleanup) = self.end(false) {
            warn!("Releasing connection after '{}' failed: {}", err, cleanup);
        }
        err
    }

    pub async fn abandon_async(mut self, err: DbError) -> DbError {
        if let Err(cleanup) = self.end_async(false).await {
            warn!("Releasing connection after '{}' failed: {}", err, cleanup);
        }
        err
    }

    fn end(&mut self, commit: bool) -> Result<()> {
        self.released = true;
        let ended = match self.transaction.take() {
            Some(tx) if commit => tx.commit(),
            Some(tx) => tx.rollback(),
            None => Ok(()),
        };
        let closed = self.connection.close();
        first_error(ended, closed)
    }

    async fn end_async(&mut self, commit: bool) -> Result<()> {
        self.released = true;
        let ended = match self.transaction.take() {
            Some(tx) if commit => tx.commit_async().await,
            Some(tx) => tx.rollback_async().await,
            None => Ok(()),
        };
        let closed = self.connection.close_async().await;
        first_error(ended, closed)
    }
}

impl<C: DbConnection> Drop for ScopedConnection<C> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.end(false) {
                warn!("Error releasing dropped connection: {}", e);
            }
        }
    }
}

fn first_error(primary: Result<()>, secondary: Result<()>) -> Result<()> {
    match (primary, secondary) {
        (Err(e), Err(other)) => {
            warn!("Discarding secondary error: {}", other);
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn settle<T>(outcome: Result<T>, ended: Result<()>) -> Result<T> {
    match (outcome, ended) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), ended) => {
            if let Err(other) = ended {
                warn!("Discarding release error after failed call: {}", other);
            }
            Err(e)
        }
    }
}
