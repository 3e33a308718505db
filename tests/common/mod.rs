#![allow(dead_code)]

use async_trait::async_trait;
use dbsession::{
    Connection, ConnectionConfig, ConnectionFactory, ConnectionProvider, ConnectionState,
    DbConnection, DbError, DbTransaction, Entity, InMemoryDB, Mapper, MemoryMapper,
    MemorySession, Result, Session, SessionConfig, Transaction,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

// ----------------------------------------------------------------------------
// In-memory fixture
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
}

impl Person {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
        }
    }

    pub fn with_id(id: i64, name: &str) -> Self {
        Self {
            id: Some(id),
            name: name.to_string(),
        }
    }
}

impl Entity for Person {
    const TABLE: &'static str = "person";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

/// Entity without an identity field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub body: String,
}

impl Entity for Note {
    const TABLE: &'static str = "note";
}

/// `person` seeded with John, Mary and Jeff (ids 1..3), plus an empty `note`.
pub fn setup() -> Arc<InMemoryDB> {
    let db = Arc::new(InMemoryDB::new());
    db.execute(
        "CREATE TABLE person (id INTEGER NOT NULL, name TEXT);
         INSERT INTO person (name) VALUES ('John'), ('Mary'), ('Jeff');
         CREATE TABLE note (id INTEGER NOT NULL, body TEXT);",
    )
    .unwrap();
    db
}

pub fn new_session(db: &Arc<InMemoryDB>) -> MemorySession {
    MemorySession::in_memory(Arc::clone(db))
}

pub fn session_with(
    db: &Arc<InMemoryDB>,
    config: SessionConfig,
) -> Session<ConnectionFactory, MemoryMapper> {
    Session::with_config(ConnectionFactory::new(Arc::clone(db)), MemoryMapper, config)
}

/// Session whose provider hands out connections already open.
pub fn pooled_session(db: &Arc<InMemoryDB>) -> MemorySession {
    let factory = ConnectionFactory::with_config(
        Arc::clone(db),
        ConnectionConfig::new().open_on_acquire(true),
    );
    Session::new(factory, MemoryMapper)
}

pub fn assert_released(db: &InMemoryDB) {
    assert_eq!(db.open_connections(), 0, "connection left open");
    assert_eq!(db.active_transactions(), 0, "transaction left active");
}

// ----------------------------------------------------------------------------
// Mapper that fails every call
// ----------------------------------------------------------------------------

pub const INJECTED: &str = "injected mapper failure";

#[derive(Debug, Default, Clone, Copy)]
pub struct FailingMapper;

fn injected() -> DbError {
    DbError::ExecutionError(INJECTED.to_string())
}

#[async_trait]
impl Mapper for FailingMapper {
    type Connection = Connection;

    fn get<E: Entity>(
        &self,
        _connection: &mut Connection,
        _id: i64,
        _transaction: Option<&mut Transaction>,
    ) -> Result<Option<E>> {
        Err(injected())
    }

    fn insert<E: Entity>(
        &self,
        _connection: &mut Connection,
        _entity: &E,
        _transaction: Option<&mut Transaction>,
    ) -> Result<i64> {
        Err(injected())
    }

    fn update<E: Entity>(
        &self,
        _connection: &mut Connection,
        _entity: &E,
        _transaction: Option<&mut Transaction>,
    ) -> Result<bool> {
        Err(injected())
    }

    fn delete<E: Entity>(
        &self,
        _connection: &mut Connection,
        _entity: &E,
        _transaction: Option<&mut Transaction>,
    ) -> Result<bool> {
        Err(injected())
    }

    fn query<E: Entity>(
        &self,
        _connection: &mut Connection,
        _sql: &str,
        _transaction: Option<&mut Transaction>,
    ) -> Result<Vec<E>> {
        Err(injected())
    }
}

pub fn failing_session(db: &Arc<InMemoryDB>) -> Session<ConnectionFactory, FailingMapper> {
    Session::new(ConnectionFactory::new(Arc::clone(db)), FailingMapper)
}

// ----------------------------------------------------------------------------
// Scripted driver with switchable faults
// ----------------------------------------------------------------------------

/// Fault switches and call counters shared by every scripted handle.
#[derive(Debug, Default)]
pub struct Script {
    pub fail_open: AtomicBool,
    pub fail_begin: AtomicBool,
    pub fail_commit: AtomicBool,
    pub fail_close: AtomicBool,

    pub acquired: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub begun: AtomicUsize,
    pub committed: AtomicUsize,
    pub rolled_back: AtomicUsize,
}

impl Script {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    fn fails(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn driver_error(what: &str) -> DbError {
    DbError::Driver(Box::new(std::io::Error::other(format!("{} failed", what))))
}

#[derive(Debug)]
pub struct ScriptedTransaction {
    script: Arc<Script>,
}

impl DbTransaction for ScriptedTransaction {
    fn commit(self) -> Result<()> {
        if Script::fails(&self.script.fail_commit) {
            return Err(driver_error("commit"));
        }
        Script::bump(&self.script.committed);
        Ok(())
    }

    fn rollback(self) -> Result<()> {
        Script::bump(&self.script.rolled_back);
        Ok(())
    }
}

#[derive(Debug)]
pub struct ScriptedConnection {
    script: Arc<Script>,
    state: ConnectionState,
}

impl DbConnection for ScriptedConnection {
    type Transaction = ScriptedTransaction;

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) -> Result<()> {
        if Script::fails(&self.script.fail_open) {
            return Err(driver_error("open"));
        }
        Script::bump(&self.script.opened);
        self.state = ConnectionState::Open;
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<ScriptedTransaction> {
        if Script::fails(&self.script.fail_begin) {
            return Err(driver_error("begin"));
        }
        Script::bump(&self.script.begun);
        Ok(ScriptedTransaction {
            script: Arc::clone(&self.script),
        })
    }

    fn close(&mut self) -> Result<()> {
        Script::bump(&self.script.closed);
        self.state = ConnectionState::Closed;
        if Script::fails(&self.script.fail_close) {
            return Err(driver_error("close"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    pub script: Arc<Script>,
}

impl ConnectionProvider for ScriptedProvider {
    type Connection = ScriptedConnection;

    fn get_connection(&self) -> Result<ScriptedConnection> {
        Script::bump(&self.script.acquired);
        Ok(ScriptedConnection {
            script: Arc::clone(&self.script),
            state: ConnectionState::Closed,
        })
    }
}

/// Mapper over the scripted driver; reads find nothing and writes succeed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptedMapper;

pub const SCRIPTED_KEY: i64 = 42;

#[async_trait]
impl Mapper for ScriptedMapper {
    type Connection = ScriptedConnection;

    fn get<E: Entity>(
        &self,
        _connection: &mut ScriptedConnection,
        _id: i64,
        _transaction: Option<&mut ScriptedTransaction>,
    ) -> Result<Option<E>> {
        Ok(None)
    }

    fn insert<E: Entity>(
        &self,
        _connection: &mut ScriptedConnection,
        _entity: &E,
        _transaction: Option<&mut ScriptedTransaction>,
    ) -> Result<i64> {
        Ok(SCRIPTED_KEY)
    }

    fn update<E: Entity>(
        &self,
        _connection: &mut ScriptedConnection,
        _entity: &E,
        _transaction: Option<&mut ScriptedTransaction>,
    ) -> Result<bool> {
        Ok(true)
    }

    fn delete<E: Entity>(
        &self,
        _connection: &mut ScriptedConnection,
        _entity: &E,
        _transaction: Option<&mut ScriptedTransaction>,
    ) -> Result<bool> {
        Ok(true)
    }

    fn query<E: Entity>(
        &self,
        _connection: &mut ScriptedConnection,
        _sql: &str,
        _transaction: Option<&mut ScriptedTransaction>,
    ) -> Result<Vec<E>> {
        Ok(Vec::new())
    }
}

pub fn scripted_session(
    config: SessionConfig,
) -> (Arc<Script>, Session<ScriptedProvider, ScriptedMapper>) {
    let script = Arc::new(Script::default());
    let provider = ScriptedProvider {
        script: Arc::clone(&script),
    };
    (script, Session::with_config(provider, ScriptedMapper, config))
}
