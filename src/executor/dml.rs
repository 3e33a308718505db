use crate::core::{DbError, Result, Row, Value};
use crate::parser::ast::InsertStmt;
use crate::storage::TableSchema;

/// Resolves the VALUES of a parsed `INSERT` into full table rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct InsertExecutor;

impl InsertExecutor {
    /// Columns left out of an explicit column list are NULL. A NULL key is
    /// filled in by the table on insert.
    pub fn build_rows(&self, insert: &InsertStmt, table: &TableSchema) -> Result<Vec<Row>> {
        let columns = table.schema().columns();

        let targets: Vec<usize> = match &insert.columns {
            Some(names) => names
                .iter()
                .map(|name| {
                    table.schema().find_column_index(name).ok_or_else(|| {
                        DbError::ColumnNotFound(name.clone(), table.name().to_string())
                    })
                })
                .collect::<Result<_>>()?,
            None => (0..columns.len()).collect(),
        };

        insert
            .values
            .iter()
            .map(|values| {
                if values.len() != targets.len() {
                    return Err(DbError::ExecutionError(format!(
                        "Expected {} values, got {}",
                        targets.len(),
                        values.len()
                    )));
                }

                let mut row = vec![Value::Null; columns.len()];
                for (&idx, value) in targets.iter().zip(values) {
                    row[idx] = columns[idx].data_type.coerce(value.clone());
                }
                table.validate_row(&row)?;
                Ok(row)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    fn person() -> TableSchema {
        TableSchema::new(
            "person",
            vec![
                Column::new("id", DataType::Integer).not_null(),
                Column::new("name", DataType::Text),
                Column::new("score", DataType::Float),
            ],
        )
        .unwrap()
    }

    fn insert(columns: Option<Vec<&str>>, values: Vec<Vec<Value>>) -> InsertStmt {
        InsertStmt {
            table_name: "person".into(),
            columns: columns.map(|c| c.into_iter().map(String::from).collect()),
            values,
        }
    }

    #[test]
    fn test_column_list_fills_missing_with_null() {
        let rows = InsertExecutor
            .build_rows(&insert(Some(vec!["name"]), vec![vec![Value::from("John")]]), &person())
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Null, Value::from("John"), Value::Null]]);
    }

    #[test]
    fn test_integer_coerced_into_float_column() {
        let rows = InsertExecutor
            .build_rows(
                &insert(None, vec![vec![Value::Integer(1), Value::from("Mary"), Value::Integer(3)]]),
                &person(),
            )
            .unwrap();
        assert!(matches!(rows[0][2], Value::Float(f) if f == 3.0));
    }

    #[test]
    fn test_arity_and_unknown_columns() {
        let err = InsertExecutor
            .build_rows(&insert(None, vec![vec![Value::Integer(1)]]), &person())
            .unwrap_err();
        assert!(matches!(err, DbError::ExecutionError(_)));

        let err = InsertExecutor
            .build_rows(&insert(Some(vec!["age"]), vec![vec![Value::Integer(1)]]), &person())
            .unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound(..)));
    }
}
