use crate::core::{DbError, Result, Row, Value};
use crate::storage::TableSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize an entity into a full row of `table`.
///
/// Object keys match columns case-insensitively and missing keys are NULL.
/// The key column is left NULL for the caller to fill in.
pub fn entity_to_row<E: Serialize>(entity: &E, table: &TableSchema) -> Result<Row> {
    let json = serde_json::to_value(entity)?;
    let serde_json::Value::Object(fields) = json else {
        return Err(DbError::MappingError(format!(
            "Entity for table '{}' must serialize to an object",
            table.name()
        )));
    };

    let columns = table.schema().columns();
    let mut row = vec![Value::Null; columns.len()];

    for (key, value) in &fields {
        let idx = table
            .schema()
            .find_column_index(key)
            .ok_or_else(|| DbError::ColumnNotFound(key.clone(), table.name().to_string()))?;
        if idx == table.key_index() {
            continue;
        }
        row[idx] = columns[idx].data_type.coerce(Value::from_json(value)?);
    }

    Ok(row)
}

/// Deserialize one result row, keyed by its output column names.
pub fn row_to_entity<E: DeserializeOwned>(columns: &[String], row: &Row) -> Result<E> {
    let fields: serde_json::Map<String, serde_json::Value> = columns
        .iter()
        .zip(row)
        .map(|(column, value)| (column.clone(), value.to_json()))
        .collect();

    Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
}
