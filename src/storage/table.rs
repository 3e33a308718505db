use crate::core::{Column, DataType, DbError, Result, Row, Schema, Value};
use std::collections::BTreeMap;

/// Table definition. Every table is keyed by an INTEGER column named `id`.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    schema: Schema,
    key_index: usize,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let name = name.into();
        let schema = Schema::new(columns);

        let key_index = schema.find_column_index("id").ok_or_else(|| {
            DbError::ConstraintViolation(format!("Table '{}' has no 'id' key column", name))
        })?;
        if schema.columns()[key_index].data_type != DataType::Integer {
            return Err(DbError::TypeMismatch(format!(
                "Key column of table '{}' must be INTEGER",
                name
            )));
        }

        Ok(Self {
            name,
            schema,
            key_index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn key_index(&self) -> usize {
        self.key_index
    }

    pub fn key_column(&self) -> &Column {
        &self.schema.columns()[self.key_index]
    }

    /// Check arity and column types. The key may still be NULL here; it is
    /// assigned on insert.
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.schema.column_count() {
            return Err(DbError::ConstraintViolation(format!(
                "Table '{}' expects {} values, got {}",
                self.name,
                self.schema.column_count(),
                row.len()
            )));
        }

        for (idx, (column, value)) in self.schema.columns().iter().zip(row).enumerate() {
            if idx == self.key_index && value.is_null() {
                continue;
            }
            column.validate(value)?;
        }

        Ok(())
    }

    pub fn key_of(&self, row: &Row) -> Option<i64> {
        row.get(self.key_index).and_then(Value::as_i64)
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<i64, Row>,
    /// `None` once `i64::MAX` has been handed out.
    next_id: Option<i64>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_id: Some(1),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Reserve the next key.
    pub fn allocate_id(&mut self) -> Result<i64> {
        let id = self.next_id.ok_or_else(|| {
            DbError::ConstraintViolation(format!(
                "Key space of table '{}' is exhausted",
                self.schema.name()
            ))
        })?;
        self.next_id = id.checked_add(1);
        Ok(id)
    }

    /// Give back a reserved key that never got committed. Only the most
    /// recent reservation can be returned; older ones stay spent.
    pub fn release_id(&mut self, id: i64) -> bool {
        if self.next_id == id.checked_add(1) && !self.rows.contains_key(&id) {
            self.next_id = Some(id);
            true
        } else {
            false
        }
    }

    /// Insert a row, assigning a key when the key column is NULL.
    pub fn insert(&mut self, mut row: Row) -> Result<i64> {
        self.schema.validate_row(&row)?;

        let id = match self.schema.key_of(&row) {
            Some(id) => {
                if self.rows.contains_key(&id) {
                    return Err(DbError::ConstraintViolation(format!(
                        "Duplicate key {} in table '{}'",
                        id,
                        self.schema.name()
                    )));
                }
                if self.next_id.is_some_and(|next| id >= next) {
                    self.next_id = id.checked_add(1);
                }
                id
            }
            None => self.allocate_id()?,
        };

        row[self.schema.key_index()] = Value::Integer(id);
        self.rows.insert(id, row);
        Ok(id)
    }

    pub fn update(&mut self, id: i64, mut row: Row) -> Result<bool> {
        self.schema.validate_row(&row)?;

        match self.rows.get_mut(&id) {
            Some(existing) => {
                row[self.schema.key_index()] = Value::Integer(id);
                *existing = row;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn delete(&mut self, id: i64) -> bool {
        self.rows.remove(&id).is_some()
    }

    pub fn get(&self, id: i64) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn rows(&self) -> &BTreeMap<i64, Row> {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
