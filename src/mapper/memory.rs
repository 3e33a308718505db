use super::Entity;
use super::row::{entity_to_row, row_to_entity};
use crate::connection::Connection;
use crate::core::{DbError, Result, Value};
use crate::interface::Mapper;
use crate::transaction::{Change, Transaction};
use async_trait::async_trait;

/// [`Mapper`] for the in-memory backend.
///
/// With a transaction, writes are buffered in it and reads see its pending
/// changes. Without one, writes land in committed storage immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryMapper;

impl MemoryMapper {
    pub fn new() -> Self {
        Self
    }

    fn check(connection: &Connection, transaction: Option<&Transaction>) -> Result<()> {
        connection.ensure_open()?;
        match transaction {
            Some(tx) if tx.connection_id() != connection.id() => {
                Err(DbError::invalid_operation(format!(
                    "{} belongs to connection {}, not {}",
                    tx.id(),
                    tx.connection_id(),
                    connection.id()
                )))
            }
            _ => Ok(()),
        }
    }

    fn require_id<E: Entity>(entity: &E) -> Result<i64> {
        entity.id().ok_or_else(|| {
            DbError::MappingError(format!(
                "Entity for table '{}' has no id",
                E::TABLE
            ))
        })
    }
}

#[async_trait]
impl Mapper for MemoryMapper {
    type Connection = Connection;

    fn get<E: Entity>(
        &self,
        connection: &mut Connection,
        id: i64,
        transaction: Option<&mut Transaction>,
    ) -> Result<Option<E>> {
        let transaction = transaction.as_deref();
        Self::check(connection, transaction)?;

        let db = connection.db();
        let overlay = transaction.map(Transaction::changes).unwrap_or(&[]);
        let schema = db.table_schema(E::TABLE)?;

        match db.read_row(E::TABLE, id, overlay)? {
            Some(row) => Ok(Some(row_to_entity(&schema.schema().column_names(), &row)?)),
            None => Ok(None),
        }
    }

    fn insert<E: Entity>(
        &self,
        connection: &mut Connection,
        entity: &E,
        transaction: Option<&mut Transaction>,
    ) -> Result<i64> {
        Self::check(connection, transaction.as_deref())?;

        let db = connection.db();
        let schema = db.table_schema(E::TABLE)?;
        let mut row = entity_to_row(entity, &schema)?;

        match transaction {
            Some(tx) => {
                schema.validate_row(&row)?;
                let id = db.allocate_id(E::TABLE)?;
                row[schema.key_index()] = Value::Integer(id);
                tx.record(Change::InsertRow {
                    table: schema.name().to_string(),
                    id,
                    row,
                })?;
                Ok(id)
            }
            None => db.insert_row(E::TABLE, row),
        }
    }

    fn update<E: Entity>(
        &self,
        connection: &mut Connection,
        entity: &E,
        transaction: Option<&mut Transaction>,
    ) -> Result<bool> {
        Self::check(connection, transaction.as_deref())?;
        let id = Self::require_id(entity)?;

        let db = connection.db();
        let schema = db.table_schema(E::TABLE)?;
        let mut row = entity_to_row(entity, &schema)?;
        row[schema.key_index()] = Value::Integer(id);

        match transaction {
            Some(tx) => {
                schema.validate_row(&row)?;
                if db.read_row(E::TABLE, id, tx.changes())?.is_none() {
                    return Ok(false);
                }
                tx.record(Change::UpdateRow {
                    table: schema.name().to_string(),
                    id,
                    row,
                })?;
                Ok(true)
            }
            None => db.update_row(E::TABLE, id, row),
        }
    }

    fn delete<E: Entity>(
        &self,
        connection: &mut Connection,
        entity: &E,
        transaction: Option<&mut Transaction>,
    ) -> Result<bool> {
        Self::check(connection, transaction.as_deref())?;
        let id = Self::require_id(entity)?;
        let db = connection.db();

        match transaction {
            Some(tx) => {
                if db.read_row(E::TABLE, id, tx.changes())?.is_none() {
                    return Ok(false);
                }
                tx.record(Change::DeleteRow {
                    table: E::TABLE.to_string(),
                    id,
                })?;
                Ok(true)
            }
            None => db.delete_row(E::TABLE, id),
        }
    }

    fn query<E: Entity>(
        &self,
        connection: &mut Connection,
        sql: &str,
        transaction: Option<&mut Transaction>,
    ) -> Result<Vec<E>> {
        let transaction = transaction.as_deref();
        Self::check(connection, transaction)?;

        let overlay = transaction.map(Transaction::changes).unwrap_or(&[]);
        let result = connection.db().query(sql, overlay)?;

        result
            .rows
            .iter()
            .map(|row| row_to_entity(&result.columns, row))
            .collect()
    }
}
