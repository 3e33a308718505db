use super::table::{Table, TableSchema};
use crate::core::{DbError, Result, Row};
use crate::transaction::change::{Change, replay_all};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

/// Committed tables, keyed by lowercase table name.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: HashMap<String, Table>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let key = schema.name().to_lowercase();
        if self.tables.contains_key(&key) {
            return Err(DbError::TableExists(schema.name().to_string()));
        }
        self.tables.insert(key, Table::new(schema));
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.tables
            .remove(&name.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .values()
            .map(|t| t.schema().name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn get_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(&name.to_lowercase())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Committed rows of a table with `overlay` replayed on top.
    pub fn materialize(&self, name: &str, overlay: &[Change]) -> Result<BTreeMap<i64, Row>> {
        let mut rows = self.get_table(name)?.rows().clone();
        replay_all(overlay, name, &mut rows);
        Ok(rows)
    }

    /// Single row as seen through `overlay`.
    pub fn read_row(&self, name: &str, id: i64, overlay: &[Change]) -> Result<Option<Row>> {
        let mut row = self.get_table(name)?.get(id).cloned();
        for change in overlay.iter().filter(|c| c.touches(name) && c.row_id() == id) {
            match change {
                Change::InsertRow { row: new_row, .. } => row = Some(new_row.clone()),
                Change::UpdateRow { row: new_row, .. } => {
                    if row.is_some() {
                        row = Some(new_row.clone());
                    }
                }
                Change::DeleteRow { .. } => row = None,
            }
        }
        Ok(row)
    }

    /// Apply a change set. Changes are staged on copies of the touched
    /// tables, so a commit either lands whole or not at all.
    pub fn apply(&mut self, changes: &[Change]) -> Result<()> {
        let mut staged: HashMap<String, Table> = HashMap::new();

        for change in changes {
            let table = match staged.entry(change.table_name().to_lowercase()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(self.get_table(change.table_name())?.clone()),
            };

            match change {
                Change::InsertRow { row, .. } => {
                    table.insert(row.clone())?;
                }
                Change::UpdateRow { id, row, .. } => {
                    table.update(*id, row.clone())?;
                }
                Change::DeleteRow { id, .. } => {
                    table.delete(*id);
                }
            }
        }

        self.tables.extend(staged);
        Ok(())
    }

    /// Hand back keys reserved by the inserts in a discarded change set,
    /// newest first. Tables dropped in the meantime are skipped.
    pub fn release_keys(&mut self, changes: &[Change]) {
        for change in changes.iter().rev() {
            if let Change::InsertRow { table, id, .. } = change {
                if let Some(table) = self.tables.get_mut(&table.to_lowercase()) {
                    table.release_id(*id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, Value};

    fn storage_with_person() -> InMemoryStorage {
        let mut storage = InMemoryStorage::new();
        storage
            .create_table(
                TableSchema::new(
                    "Person",
                    vec![
                        Column::new("id", DataType::Integer).not_null(),
                        Column::new("name", DataType::Text),
                    ],
                )
                .unwrap(),
            )
            .unwrap();
        let table = storage.get_table_mut("person").unwrap();
        table.insert(vec![Value::Null, Value::from("John")]).unwrap();
        storage
    }

    #[test]
    fn test_create_and_drop() {
        let mut storage = storage_with_person();
        assert!(storage.table_exists("PERSON"));
        assert_eq!(storage.table_names(), vec!["Person"]);

        let dup = TableSchema::new("person", vec![Column::new("id", DataType::Integer)]).unwrap();
        assert!(matches!(storage.create_table(dup), Err(DbError::TableExists(_))));

        storage.drop_table("person").unwrap();
        assert!(matches!(storage.drop_table("person"), Err(DbError::TableNotFound(_))));
    }

    #[test]
    fn test_read_row_through_overlay() {
        let storage = storage_with_person();
        let overlay = vec![Change::DeleteRow { table: "person".into(), id: 1 }];

        assert!(storage.read_row("person", 1, &overlay).unwrap().is_none());
        assert!(storage.read_row("person", 1, &[]).unwrap().is_some());
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut storage = storage_with_person();
        let changes = vec![
            Change::DeleteRow { table: "person".into(), id: 1 },
            Change::DeleteRow { table: "missing".into(), id: 1 },
        ];

        assert!(matches!(storage.apply(&changes), Err(DbError::TableNotFound(_))));
        assert_eq!(storage.get_table("person").unwrap().row_count(), 1);
    }

    #[test]
    fn test_release_keys_walks_newest_first() {
        let mut storage = storage_with_person();
        let table = storage.get_table_mut("person").unwrap();
        let a = table.allocate_id().unwrap();
        let b = table.allocate_id().unwrap();
        let changes = vec![
            Change::InsertRow { table: "person".into(), id: a, row: vec![Value::Integer(a), Value::from("Ann")] },
            Change::InsertRow { table: "person".into(), id: b, row: vec![Value::Integer(b), Value::from("Bob")] },
            Change::InsertRow { table: "gone".into(), id: 1, row: vec![Value::Integer(1)] },
        ];

        storage.release_keys(&changes);
        assert_eq!(storage.get_table_mut("person").unwrap().allocate_id().unwrap(), 2);
    }

    #[test]
    fn test_apply_rolls_back_on_duplicate_key() {
        let mut storage = storage_with_person();
        let changes = vec![
            Change::InsertRow {
                table: "person".into(),
                id: 2,
                row: vec![Value::Integer(2), Value::from("Mary")],
            },
            Change::InsertRow {
                table: "person".into(),
                id: 1,
                row: vec![Value::Integer(1), Value::from("Again")],
            },
        ];

        assert!(matches!(storage.apply(&changes), Err(DbError::ConstraintViolation(_))));
        assert_eq!(storage.get_table("person").unwrap().row_count(), 1);
    }
}
