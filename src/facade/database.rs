use crate::core::{Result, Row};
use crate::executor::{CreateTableExecutor, InsertExecutor, QueryExecutor};
use crate::parser::SqlParserAdapter;
use crate::parser::ast::{CreateTableStmt, DropTableStmt, InsertStmt, QueryStmt, Statement};
use crate::result::QueryResult;
use crate::storage::{InMemoryStorage, TableSchema};
use crate::transaction::Change;
use log::debug;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Shared in-memory database behind the reference connection and mapper.
///
/// Committed data lives here; uncommitted work stays in each
/// [`Transaction`](crate::transaction::Transaction) until commit. The
/// open-connection and active-transaction counters let callers check that
/// every handle was released.
pub struct InMemoryDB {
    parser: SqlParserAdapter,
    storage: RwLock<InMemoryStorage>,
    next_connection_id: AtomicU64,
    open_connections: AtomicUsize,
    active_transactions: AtomicUsize,
}

impl InMemoryDB {
    pub fn new() -> Self {
        Self {
            parser: SqlParserAdapter::new(),
            storage: RwLock::new(InMemoryStorage::new()),
            next_connection_id: AtomicU64::new(1),
            open_connections: AtomicUsize::new(0),
            active_transactions: AtomicUsize::new(0),
        }
    }

    /// Run one or more `;`-separated statements outside any transaction and
    /// return the result of the last one.
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        let statements = self.parser.parse(sql)?;
        let mut last = QueryResult::empty();

        for stmt in statements {
            last = match stmt {
                Statement::CreateTable(create) => self.create_table(&create)?,
                Statement::DropTable(drop) => self.drop_table(&drop)?,
                Statement::Insert(insert) => self.insert(&insert)?,
                Statement::Query(query) => self.run_query(&query, &[])?,
            };
        }

        Ok(last)
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.storage
            .read()
            .map(|storage| storage.table_exists(name))
            .unwrap_or(false)
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.storage.read()?.table_names())
    }

    /// Committed row count of a table.
    pub fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.storage.read()?.get_table(table)?.row_count())
    }

    pub fn table_stats(&self, table: &str) -> Result<TableStats> {
        let storage = self.storage.read()?;
        let table = storage.get_table(table)?;
        Ok(TableStats {
            name: table.schema().name().to_string(),
            column_count: table.schema().schema().column_count(),
            row_count: table.row_count(),
        })
    }

    /// Connections currently open against this database.
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Transactions begun and not yet committed or rolled back.
    pub fn active_transactions(&self) -> usize {
        self.active_transactions.load(Ordering::SeqCst)
    }

    // --- connection and transaction bookkeeping ---

    pub(crate) fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn connection_opened(&self) {
        self.open_connections.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn connection_closed(&self) {
        // never underflow, even on a double close
        let _ = self
            .open_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub(crate) fn transaction_started(&self) {
        self.active_transactions.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn transaction_finished(&self) {
        let _ = self
            .active_transactions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    // --- row access used by the mapper ---

    pub(crate) fn table_schema(&self, table: &str) -> Result<TableSchema> {
        Ok(self.storage.read()?.get_table(table)?.schema().clone())
    }

    pub(crate) fn read_row(&self, table: &str, id: i64, overlay: &[Change]) -> Result<Option<Row>> {
        self.storage.read()?.read_row(table, id, overlay)
    }

    /// Evaluate a SELECT with `overlay` layered over committed data.
    pub(crate) fn query(&self, sql: &str, overlay: &[Change]) -> Result<QueryResult> {
        let query = self.parser.parse_query(sql)?;
        self.run_query(&query, overlay)
    }

    /// Reserve a key in `table` for an uncommitted insert.
    pub(crate) fn allocate_id(&self, table: &str) -> Result<i64> {
        self.storage.write()?.get_table_mut(table)?.allocate_id()
    }

    /// Return the keys reserved by a change set that will never be applied.
    pub(crate) fn release_keys(&self, changes: &[Change]) -> Result<()> {
        if !changes.is_empty() {
            self.storage.write()?.release_keys(changes);
        }
        Ok(())
    }

    pub(crate) fn insert_row(&self, table: &str, row: Row) -> Result<i64> {
        self.storage.write()?.get_table_mut(table)?.insert(row)
    }

    pub(crate) fn update_row(&self, table: &str, id: i64, row: Row) -> Result<bool> {
        self.storage.write()?.get_table_mut(table)?.update(id, row)
    }

    pub(crate) fn delete_row(&self, table: &str, id: i64) -> Result<bool> {
        Ok(self.storage.write()?.get_table_mut(table)?.delete(id))
    }

    /// Apply a committed change set atomically.
    pub(crate) fn apply(&self, changes: &[Change]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.storage.write()?.apply(changes)
    }

    fn create_table(&self, create: &CreateTableStmt) -> Result<QueryResult> {
        let mut storage = self.storage.write()?;
        if create.if_not_exists && storage.table_exists(&create.table_name) {
            return Ok(QueryResult::empty());
        }

        let schema = CreateTableExecutor.build_schema(create)?;
        storage.create_table(schema)?;
        debug!("Created table '{}'", create.table_name);
        Ok(QueryResult::empty())
    }

    fn drop_table(&self, drop: &DropTableStmt) -> Result<QueryResult> {
        let mut storage = self.storage.write()?;
        if drop.if_exists && !storage.table_exists(&drop.table_name) {
            return Ok(QueryResult::empty());
        }

        storage.drop_table(&drop.table_name)?;
        debug!("Dropped table '{}'", drop.table_name);
        Ok(QueryResult::empty())
    }

    fn insert(&self, insert: &InsertStmt) -> Result<QueryResult> {
        let mut storage = self.storage.write()?;
        let table = storage.get_table_mut(&insert.table_name)?;
        let rows = InsertExecutor.build_rows(insert, table.schema())?;

        for row in rows {
            table.insert(row)?;
        }
        Ok(QueryResult::empty())
    }

    fn run_query(&self, query: &QueryStmt, overlay: &[Change]) -> Result<QueryResult> {
        let storage = self.storage.read()?;
        let table = storage.get_table(&query.table_name)?.schema().clone();
        let rows = storage.materialize(&query.table_name, overlay)?;
        drop(storage);

        QueryExecutor::new().execute(query, &table, rows)
    }
}

impl Default for InMemoryDB {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDB")
            .field("open_connections", &self.open_connections())
            .field("active_transactions", &self.active_transactions())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct TableStats {
    pub name: String,
    pub column_count: usize,
    pub row_count: usize,
}

impl std::fmt::Display for TableStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Table '{}': {} columns, {} rows",
            self.name, self.column_count, self.row_count
        )
    }
}
