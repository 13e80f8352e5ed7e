// SQL Parser
// Converts SQL strings into the statements the executor understands.
// The sqlparser crate handles the grammar; this module picks out the parts we support.

use crate::error::{QueryError, Result};
use crate::storage::{Column, DataType, Schema, Value};
use sqlparser::ast::{
    ColumnOption, Distinct, Expr, GroupByExpr, ObjectName, OrderByExpr, SelectItem, SetExpr,
    Statement, TableFactor, Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// The statements the engine supports
#[derive(Debug)]
pub enum Query {
    /// CREATE TABLE tablename (col1 TYPE, col2 TYPE, ...)
    CreateTable { name: String, schema: Schema },
    /// Bulk insert of already-typed values.
    /// Built by the loader directly, never parsed from user text.
    Insert {
        table_name: String,
        rows: Vec<Vec<Value>>,
    },
    /// SELECT ... [FROM tablename] [WHERE ...] [GROUP BY ...] [ORDER BY ...] [LIMIT n]
    Select(Box<SelectStatement>),
}

/// A parsed, not yet bound, SELECT statement.
/// Expressions are still sqlparser AST nodes; the planner resolves them
/// against a table schema.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    /// None for a FROM-less SELECT such as `SELECT 1 + 1`
    pub table_name: Option<String>,
    /// Alias given to the table in the FROM clause
    pub table_alias: Option<String>,
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// The query parser
pub struct QueryParser;

impl QueryParser {
    /// Parse a SQL string into a Query
    pub fn parse(sql: &str) -> Result<Query> {
        let dialect = GenericDialect {};
        let ast = Parser::parse_sql(&dialect, sql)?;

        // We only support single statements
        if ast.len() != 1 {
            return Err(QueryError::Parse(format!(
                "expected exactly one statement, found {}",
                ast.len()
            )));
        }

        match &ast[0] {
            Statement::CreateTable(create_table) => Self::parse_create_table(create_table),
            Statement::Query(query) => Self::parse_select(query),
            other => Err(QueryError::Unsupported(format!(
                "statement type: {}",
                statement_keyword(other)
            ))),
        }
    }

    /// Parse CREATE TABLE statement
    fn parse_create_table(create_table: &sqlparser::ast::CreateTable) -> Result<Query> {
        let name = object_name_to_string(&create_table.name);
        let mut columns = Vec::new();

        for column_def in &create_table.columns {
            let data_type = Self::parse_data_type(&column_def.data_type)?;

            let nullable = !column_def
                .options
                .iter()
                .any(|opt| matches!(opt.option, ColumnOption::NotNull));

            columns.push(Column {
                // The unquoted identifier, not its SQL spelling
                name: column_def.name.value.clone(),
                data_type,
                nullable,
            });
        }

        Ok(Query::CreateTable {
            name,
            schema: Schema::new(columns),
        })
    }

    /// Parse a SELECT query
    fn parse_select(query: &sqlparser::ast::Query) -> Result<Query> {
        if query.with.is_some() {
            return Err(QueryError::Unsupported("WITH clauses".to_string()));
        }

        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            SetExpr::SetOperation { .. } => {
                return Err(QueryError::Unsupported(
                    "UNION / INTERSECT / EXCEPT".to_string(),
                ))
            }
            _ => return Err(QueryError::Unsupported("SELECT format".to_string())),
        };

        let distinct = match &select.distinct {
            None => false,
            Some(Distinct::Distinct) => true,
            Some(Distinct::On(_)) => {
                return Err(QueryError::Unsupported("DISTINCT ON".to_string()))
            }
        };

        let (table_name, table_alias) = match select.from.as_slice() {
            [] => (None, None),
            [from] => {
                if !from.joins.is_empty() {
                    return Err(QueryError::Unsupported("JOIN".to_string()));
                }
                match &from.relation {
                    TableFactor::Table { name, alias, .. } => (
                        Some(object_name_to_string(name)),
                        alias.as_ref().map(|a| a.name.value.clone()),
                    ),
                    _ => return Err(QueryError::Unsupported("table reference".to_string())),
                }
            }
            _ => return Err(QueryError::Unsupported("multiple tables in FROM".to_string())),
        };

        let group_by = match &select.group_by {
            GroupByExpr::Expressions(exprs, modifiers) => {
                if !modifiers.is_empty() {
                    return Err(QueryError::Unsupported("GROUP BY modifiers".to_string()));
                }
                exprs.clone()
            }
            GroupByExpr::All(_) => return Err(QueryError::Unsupported("GROUP BY ALL".to_string())),
        };

        let order_by = match &query.order_by {
            Some(order_by) => order_by.exprs.clone(),
            None => Vec::new(),
        };

        let limit = match &query.limit {
            Some(expr) => Some(Self::parse_count(expr, "LIMIT")?),
            None => None,
        };

        let offset = match &query.offset {
            Some(offset) => Self::parse_count(&offset.value, "OFFSET")?,
            None => 0,
        };

        Ok(Query::Select(Box::new(SelectStatement {
            table_name,
            table_alias,
            distinct,
            projection: select.projection.clone(),
            selection: select.selection.clone(),
            group_by,
            having: select.having.clone(),
            order_by,
            limit,
            offset,
        })))
    }

    fn parse_data_type(sql_type: &sqlparser::ast::DataType) -> Result<DataType> {
        affinity(sql_type)
            .ok_or_else(|| QueryError::Unsupported(format!("data type {}", sql_type)))
    }

    /// Parse a non-negative integer literal (LIMIT / OFFSET)
    fn parse_count(expr: &Expr, clause: &str) -> Result<usize> {
        match expr {
            Expr::Value(SqlValue::Number(n, _)) => n
                .parse()
                .map_err(|_| QueryError::Parse(format!("invalid {} value: {}", clause, n))),
            other => Err(QueryError::Unsupported(format!(
                "{} expression: {}",
                clause, other
            ))),
        }
    }
}

/// Map a declared type to a storage type.
/// Uses the same name-based affinity rules as SQLite, so `VARCHAR(20)`,
/// `DOUBLE PRECISION` and `BIGINT` all land somewhere sensible.
pub(crate) fn affinity(sql_type: &sqlparser::ast::DataType) -> Option<DataType> {
    let declared = sql_type.to_string().to_uppercase();
    let has = |needle: &str| declared.contains(needle);

    if has("INT") {
        Some(DataType::Integer)
    } else if has("CHAR") || has("TEXT") || has("CLOB") || has("STRING") {
        Some(DataType::Text)
    } else if has("REAL") || has("FLOA") || has("DOUB") || has("NUMERIC") || has("DECIMAL") {
        Some(DataType::Real)
    } else if has("BOOL") {
        Some(DataType::Boolean)
    } else {
        None
    }
}

/// Join the parts of a (possibly qualified) name, unquoted
pub fn object_name_to_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|i| i.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}

/// First keyword of a statement, for error messages
fn statement_keyword(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}
