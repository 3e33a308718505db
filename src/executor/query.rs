// ============================================================================
// src/executor/query.rs - SELECT over a materialized table
// ============================================================================

use crate::core::{DbError, Result, Row, Value};
use crate::parser::ast::{BinaryOp, Expr, QueryStmt, SelectItem};
use crate::result::QueryResult;
use crate::storage::TableSchema;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Runs a parsed SELECT against rows already resolved for the caller's
/// visibility (committed data plus any transaction overlay).
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryExecutor;

impl QueryExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        &self,
        query: &QueryStmt,
        table: &TableSchema,
        rows: BTreeMap<i64, Row>,
    ) -> Result<QueryResult> {
        let mut selected = Vec::with_capacity(rows.len());
        for row in rows.into_values() {
            let keep = match &query.selection {
                Some(predicate) => is_true(&evaluate(predicate, table, &row)?),
                None => true,
            };
            if keep {
                selected.push(row);
            }
        }

        self.sort(query, table, &mut selected)?;

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        let window: Vec<Row> = selected.into_iter().skip(offset).take(limit).collect();

        self.project(query, table, window)
    }

    fn sort(&self, query: &QueryStmt, table: &TableSchema, rows: &mut [Row]) -> Result<()> {
        if query.order_by.is_empty() {
            return Ok(());
        }

        let keys = query
            .order_by
            .iter()
            .map(|order| Ok((column_index(table, &order.column)?, order.descending)))
            .collect::<Result<Vec<_>>>()?;

        // sort_by cannot fail, so the first comparison error is carried out
        let mut failure = None;
        rows.sort_by(|a, b| {
            for &(idx, descending) in &keys {
                match a[idx].compare(&b[idx]) {
                    Ok(Ordering::Equal) => continue,
                    Ok(ordering) if descending => return ordering.reverse(),
                    Ok(ordering) => return ordering,
                    Err(e) => {
                        failure.get_or_insert(e);
                        return Ordering::Equal;
                    }
                }
            }
            Ordering::Equal
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn project(&self, query: &QueryStmt, table: &TableSchema, rows: Vec<Row>) -> Result<QueryResult> {
        let schema = table.schema();
        let mut columns = Vec::new();
        let mut indexes = Vec::new();

        for item in &query.projection {
            match item {
                SelectItem::Wildcard => {
                    for (idx, column) in schema.columns().iter().enumerate() {
                        columns.push(column.name.clone());
                        indexes.push(idx);
                    }
                }
                SelectItem::Column { name, alias } => {
                    let idx = column_index(table, name)?;
                    columns.push(alias.clone().unwrap_or_else(|| schema.columns()[idx].name.clone()));
                    indexes.push(idx);
                }
            }
        }

        let rows = rows
            .into_iter()
            .map(|row| indexes.iter().map(|&idx| row[idx].clone()).collect())
            .collect();

        Ok(QueryResult::new(columns, rows))
    }
}

fn column_index(table: &TableSchema, name: &str) -> Result<usize> {
    table
        .schema()
        .find_column_index(name)
        .ok_or_else(|| DbError::ColumnNotFound(name.to_string(), table.name().to_string()))
}

fn is_true(value: &Value) -> bool {
    !value.is_null() && value.as_bool()
}

/// Evaluate with SQL NULL semantics: comparisons involving NULL yield NULL,
/// and NULL rows never pass a filter.
pub fn evaluate(expr: &Expr, table: &TableSchema, row: &Row) -> Result<Value> {
    match expr {
        Expr::Column(name) => Ok(row[column_index(table, name)?].clone()),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Not(inner) => {
            let value = evaluate(inner, table, row)?;
            if value.is_null() {
                Ok(Value::Null)
            } else {
                Ok(Value::Boolean(!value.as_bool()))
            }
        }
        Expr::IsNull { expr, negated } => {
            let is_null = evaluate(expr, table, row)?.is_null();
            Ok(Value::Boolean(is_null != *negated))
        }
        Expr::BinaryOp { left, op, right } => {
            let left = evaluate(left, table, row)?;
            let right = evaluate(right, table, row)?;
            match op {
                BinaryOp::And => Ok(logical_and(&left, &right)),
                BinaryOp::Or => Ok(logical_or(&left, &right)),
                _ if left.is_null() || right.is_null() => Ok(Value::Null),
                BinaryOp::Eq => Ok(Value::Boolean(left == right)),
                BinaryOp::NotEq => Ok(Value::Boolean(left != right)),
                BinaryOp::Lt => Ok(Value::Boolean(left.compare(&right)? == Ordering::Less)),
                BinaryOp::LtEq => Ok(Value::Boolean(left.compare(&right)? != Ordering::Greater)),
                BinaryOp::Gt => Ok(Value::Boolean(left.compare(&right)? == Ordering::Greater)),
                BinaryOp::GtEq => Ok(Value::Boolean(left.compare(&right)? != Ordering::Less)),
            }
        }
    }
}

fn logical_and(left: &Value, right: &Value) -> Value {
    let falsy = |v: &Value| !v.is_null() && !v.as_bool();
    if falsy(left) || falsy(right) {
        Value::Boolean(false)
    } else if left.is_null() || right.is_null() {
        Value::Null
    } else {
        Value::Boolean(true)
    }
}

fn logical_or(left: &Value, right: &Value) -> Value {
    if is_true(left) || is_true(right) {
        Value::Boolean(true)
    } else if left.is_null() || right.is_null() {
        Value::Null
    } else {
        Value::Boolean(false)
    }
}
