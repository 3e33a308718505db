// ============================================================================
// src/parser/adapter.rs - sqlparser AST -> internal statements
// ============================================================================

use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use crate::core::{DbError, Result, DataType, Value};
use crate::parser::ast::*;

pub struct SqlParserAdapter {
    dialect: PostgreSqlDialect,
}

impl SqlParserAdapter {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>> {
        let external_stmts = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| DbError::ParseError(e.to_string()))?;

        external_stmts
            .into_iter()
            .map(|stmt| self.convert_statement(stmt))
            .collect()
    }

    /// Parse exactly one SELECT statement.
    pub fn parse_query(&self, sql: &str) -> Result<QueryStmt> {
        let mut statements = self.parse(sql)?;
        if statements.len() != 1 {
            return Err(DbError::UnsupportedOperation(format!(
                "Expected a single SELECT statement, got {}",
                statements.len()
            )));
        }
        match statements.remove(0) {
            Statement::Query(query) => Ok(query),
            other => Err(DbError::UnsupportedOperation(format!(
                "Expected a SELECT statement, got {:?}",
                other
            ))),
        }
    }

    fn convert_statement(&self, stmt: sql_ast::Statement) -> Result<Statement> {
        match stmt {
            sql_ast::Statement::CreateTable(create) => {
                Ok(Statement::CreateTable(self.convert_create_table(create)?))
            }
            sql_ast::Statement::Drop { object_type, names, if_exists, .. } => {
                if let sql_ast::ObjectType::Table = object_type {
                    Ok(Statement::DropTable(self.convert_drop_table(names, if_exists)?))
                } else {
                    Err(DbError::UnsupportedOperation(format!(
                        "Only DROP TABLE supported, got: {:?}",
                        object_type
                    )))
                }
            }
            sql_ast::Statement::Insert(insert) => {
                Ok(Statement::Insert(self.convert_insert(insert)?))
            }
            sql_ast::Statement::Query(query) => {
                Ok(Statement::Query(self.convert_query(*query)?))
            }
            _ => Err(DbError::UnsupportedOperation(format!(
                "Statement type not supported: {}",
                stmt
            ))),
        }
    }

    fn convert_create_table(&self, create: sql_ast::CreateTable) -> Result<CreateTableStmt> {
        let table_name = extract_table_name(&create.name)?;
        let columns = create
            .columns
            .into_iter()
            .map(|col| self.convert_column_def(col))
            .collect::<Result<Vec<_>>>()?;

        Ok(CreateTableStmt {
            table_name,
            columns,
            if_not_exists: create.if_not_exists,
        })
    }

    fn convert_drop_table(&self, names: Vec<sql_ast::ObjectName>, if_exists: bool) -> Result<DropTableStmt> {
        if names.len() != 1 {
            return Err(DbError::UnsupportedOperation(
                "Only single table DROP supported".into()
            ));
        }

        let table_name = extract_table_name(&names[0])?;

        Ok(DropTableStmt {
            table_name,
            if_exists,
        })
    }

    fn convert_column_def(&self, col: sql_ast::ColumnDef) -> Result<ColumnDef> {
        let data_type = self.convert_data_type(&col.data_type)?;
        let nullable = !col
            .options
            .iter()
            .any(|opt| matches!(opt.option, sql_ast::ColumnOption::NotNull));

        Ok(ColumnDef {
            name: col.name.value,
            data_type,
            nullable,
        })
    }

    fn convert_data_type(&self, dt: &sql_ast::DataType) -> Result<DataType> {
        match dt {
            sql_ast::DataType::Int(_)
            | sql_ast::DataType::Integer(_)
            | sql_ast::DataType::BigInt(_) => Ok(DataType::Integer),

            sql_ast::DataType::Float(_)
            | sql_ast::DataType::Double(_)
            | sql_ast::DataType::Real => Ok(DataType::Float),

            sql_ast::DataType::Text
            | sql_ast::DataType::Varchar(_)
            | sql_ast::DataType::Char(_)
            | sql_ast::DataType::String(_) => Ok(DataType::Text),

            sql_ast::DataType::Boolean
            | sql_ast::DataType::Bool => Ok(DataType::Boolean),

            _ => Err(DbError::TypeMismatch(format!(
                "Unsupported data type: {:?}",
                dt
            ))),
        }
    }

    fn convert_insert(&self, insert: sql_ast::Insert) -> Result<InsertStmt> {
        let table_name = insert.table.to_string();

        let columns = if insert.columns.is_empty() {
            None
        } else {
            Some(insert.columns.into_iter().map(|id| id.value).collect())
        };

        let Some(source) = insert.source else {
            return Err(DbError::UnsupportedOperation(
                "INSERT requires a VALUES clause".into()
            ));
        };

        let sql_ast::SetExpr::Values(vals) = *source.body else {
            return Err(DbError::UnsupportedOperation(
                "Only VALUES clause supported".into()
            ));
        };

        let values = vals
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|expr| self.convert_literal(expr))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(InsertStmt {
            table_name,
            columns,
            values,
        })
    }

    fn convert_query(&self, query: sql_ast::Query) -> Result<QueryStmt> {
        let sql_ast::SetExpr::Select(select) = *query.body else {
            return Err(DbError::UnsupportedOperation(
                "Only SELECT queries supported".into()
            ));
        };

        if select.distinct.is_some() {
            return Err(DbError::UnsupportedOperation("DISTINCT not supported".into()));
        }
        if select.having.is_some() {
            return Err(DbError::UnsupportedOperation("HAVING not supported".into()));
        }
        match &select.group_by {
            sql_ast::GroupByExpr::Expressions(exprs, _) if exprs.is_empty() => {}
            _ => return Err(DbError::UnsupportedOperation("GROUP BY not supported".into())),
        }

        let select = *select;

        let table_name = match select.from.as_slice() {
            [table] if table.joins.is_empty() => match &table.relation {
                sql_ast::TableFactor::Table { name, .. } => extract_table_name(name)?,
                other => {
                    return Err(DbError::UnsupportedOperation(format!(
                        "Unsupported FROM source: {}",
                        other
                    )));
                }
            },
            _ => {
                return Err(DbError::UnsupportedOperation(
                    "SELECT must read from exactly one table without joins".into()
                ));
            }
        };

        let projection = select
            .projection
            .into_iter()
            .map(|item| self.convert_select_item(item))
            .collect::<Result<Vec<_>>>()?;

        let selection = select
            .selection
            .map(|expr| self.convert_expr(expr))
            .transpose()?;

        let order_by = self.convert_order_by(query.order_by)?;
        let (limit, offset) = self.convert_limit_clause(query.limit_clause)?;

        Ok(QueryStmt {
            projection,
            table_name,
            selection,
            order_by,
            limit,
            offset,
        })
    }

    fn convert_select_item(&self, item: sql_ast::SelectItem) -> Result<SelectItem> {
        match item {
            sql_ast::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
            sql_ast::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Column {
                name: column_name(&expr)?,
                alias: None,
            }),
            sql_ast::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Column {
                name: column_name(&expr)?,
                alias: Some(alias.value),
            }),
            other => Err(DbError::UnsupportedOperation(format!(
                "Unsupported select item: {}",
                other
            ))),
        }
    }

    fn convert_order_by(&self, order_by: Option<sql_ast::OrderBy>) -> Result<Vec<OrderByExpr>> {
        let Some(order_by) = order_by else {
            return Ok(Vec::new());
        };

        match order_by.kind {
            sql_ast::OrderByKind::Expressions(exprs) => exprs
                .into_iter()
                .map(|order| {
                    Ok(OrderByExpr {
                        column: column_name(&order.expr)?,
                        // ASC unless DESC is explicit
                        descending: order.options.asc.map(|asc| !asc).unwrap_or(false),
                    })
                })
                .collect(),
            sql_ast::OrderByKind::All(_) => Err(DbError::UnsupportedOperation(
                "ORDER BY ALL not supported".into()
            )),
        }
    }

    fn convert_limit_clause(
        &self,
        limit_clause: Option<sql_ast::LimitClause>,
    ) -> Result<(Option<usize>, Option<usize>)> {
        let Some(clause) = limit_clause else {
            return Ok((None, None));
        };

        match clause {
            sql_ast::LimitClause::LimitOffset { limit, offset, .. } => {
                let limit = limit.map(|expr| self.convert_count(expr)).transpose()?;
                let offset = offset.map(|o| self.convert_count(o.value)).transpose()?;
                Ok((limit, offset))
            }
            // MySQL style: LIMIT offset, limit
            sql_ast::LimitClause::OffsetCommaLimit { offset, limit } => {
                Ok((Some(self.convert_count(limit)?), Some(self.convert_count(offset)?)))
            }
        }
    }

    fn convert_count(&self, expr: sql_ast::Expr) -> Result<usize> {
        match self.convert_literal(expr)? {
            Value::Integer(n) if n >= 0 => Ok(n as usize),
            other => Err(DbError::ParseError(format!(
                "Expected a non-negative integer, got {}",
                other
            ))),
        }
    }

    fn convert_expr(&self, expr: sql_ast::Expr) -> Result<Expr> {
        match expr {
            sql_ast::Expr::Identifier(ident) => Ok(Expr::Column(ident.value)),
            sql_ast::Expr::CompoundIdentifier(idents) => idents
                .into_iter()
                .last()
                .map(|ident| Expr::Column(ident.value))
                .ok_or_else(|| DbError::ParseError("Empty identifier".into())),
            sql_ast::Expr::Nested(inner) => self.convert_expr(*inner),
            sql_ast::Expr::IsNull(inner) => Ok(Expr::IsNull {
                expr: Box::new(self.convert_expr(*inner)?),
                negated: false,
            }),
            sql_ast::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
                expr: Box::new(self.convert_expr(*inner)?),
                negated: true,
            }),
            sql_ast::Expr::UnaryOp { op: sql_ast::UnaryOperator::Not, expr } => {
                Ok(Expr::Not(Box::new(self.convert_expr(*expr)?)))
            }
            sql_ast::Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
                left: Box::new(self.convert_expr(*left)?),
                op: convert_binary_op(&op)?,
                right: Box::new(self.convert_expr(*right)?),
            }),
            other => Ok(Expr::Literal(self.convert_literal(other)?)),
        }
    }

    fn convert_literal(&self, expr: sql_ast::Expr) -> Result<Value> {
        match expr {
            sql_ast::Expr::Value(val) => convert_value(&val.value),
            sql_ast::Expr::Nested(inner) => self.convert_literal(*inner),
            sql_ast::Expr::UnaryOp { op: sql_ast::UnaryOperator::Minus, expr } => {
                match self.convert_literal(*expr)? {
                    Value::Integer(i) => Ok(Value::Integer(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(DbError::TypeMismatch(format!(
                        "Cannot negate {}",
                        other.type_name()
                    ))),
                }
            }
            other => Err(DbError::UnsupportedOperation(format!(
                "Unsupported expression: {}",
                other
            ))),
        }
    }
}

impl Default for SqlParserAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SqlParserAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SqlParserAdapter(postgres)")
    }
}

fn convert_value(val: &sql_ast::Value) -> Result<Value> {
    match val {
        sql_ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Integer(i))
            } else if let Ok(f) = n.parse::<f64>() {
                Ok(Value::Float(f))
            } else {
                Err(DbError::TypeMismatch(format!("Invalid number: {}", n)))
            }
        }
        sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
            Ok(Value::Text(s.clone()))
        }
        sql_ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        sql_ast::Value::Null => Ok(Value::Null),
        _ => Err(DbError::UnsupportedOperation(format!(
            "Unsupported value: {:?}",
            val
        ))),
    }
}

fn convert_binary_op(op: &sql_ast::BinaryOperator) -> Result<BinaryOp> {
    use sql_ast::BinaryOperator as SqlOp;

    match op {
        SqlOp::Eq => Ok(BinaryOp::Eq),
        SqlOp::NotEq => Ok(BinaryOp::NotEq),
        SqlOp::Lt => Ok(BinaryOp::Lt),
        SqlOp::LtEq => Ok(BinaryOp::LtEq),
        SqlOp::Gt => Ok(BinaryOp::Gt),
        SqlOp::GtEq => Ok(BinaryOp::GtEq),
        SqlOp::And => Ok(BinaryOp::And),
        SqlOp::Or => Ok(BinaryOp::Or),
        _ => Err(DbError::UnsupportedOperation(format!(
            "Unsupported binary operator: {:?}",
            op
        ))),
    }
}

fn column_name(expr: &sql_ast::Expr) -> Result<String> {
    match expr {
        sql_ast::Expr::Identifier(ident) => Ok(ident.value.clone()),
        sql_ast::Expr::CompoundIdentifier(idents) => idents
            .last()
            .map(|ident| ident.value.clone())
            .ok_or_else(|| DbError::ParseError("Empty identifier".into())),
        other => Err(DbError::UnsupportedOperation(format!(
            "Only column references supported here, got: {}",
            other
        ))),
    }
}

fn extract_table_name(name: &sql_ast::ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|ident| ident.to_string())
        .ok_or_else(|| DbError::ParseError("Invalid table name".into()))
}

// ============================================================================
// TESTS
// ============================================================================
