use crate::core::{Column, Result};
use crate::parser::ast::CreateTableStmt;
use crate::storage::TableSchema;

/// Turns a parsed `CREATE TABLE` into a table definition.
#[derive(Debug, Default, Clone, Copy)]
pub struct CreateTableExecutor;

impl CreateTableExecutor {
    pub fn build_schema(&self, create: &CreateTableStmt) -> Result<TableSchema> {
        let columns = create
            .columns
            .iter()
            .map(|def| {
                let column = Column::new(def.name.clone(), def.data_type);
                if def.nullable { column } else { column.not_null() }
            })
            .collect();

        TableSchema::new(create.table_name.clone(), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, DbError};
    use crate::parser::ast::ColumnDef;

    fn create(columns: Vec<(&str, DataType, bool)>) -> CreateTableStmt {
        CreateTableStmt {
            table_name: "person".into(),
            columns: columns
                .into_iter()
                .map(|(name, data_type, nullable)| ColumnDef {
                    name: name.into(),
                    data_type,
                    nullable,
                })
                .collect(),
            if_not_exists: false,
        }
    }

    #[test]
    fn test_builds_schema_with_key() {
        let schema = CreateTableExecutor
            .build_schema(&create(vec![
                ("id", DataType::Integer, false),
                ("name", DataType::Text, true),
            ]))
            .unwrap();

        assert_eq!(schema.name(), "person");
        assert_eq!(schema.key_index(), 0);
        assert!(!schema.key_column().nullable);
        assert!(schema.schema().columns()[1].nullable);
    }

    #[test]
    fn test_table_without_key_is_rejected() {
        let err = CreateTableExecutor
            .build_schema(&create(vec![("name", DataType::Text, true)]))
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
    }
}
