// Store loader
// Turns a parsed dataset into a one-table in-memory database

use crate::dataset::{parse_number, ColumnKind, ParsedDataset, Record};
use crate::error::{QueryError, Result};
use crate::naming::NameMapping;
use crate::query::parser::{Query, QueryParser};
use crate::query::{QueryExecutor, QueryResult, ResultRow};
use crate::storage::Value;
use tracing::debug;

/// The in-memory table built from a dataset, together with the name mapping
/// that describes its columns. The two are always built and replaced together.
pub struct LoadedStore {
    executor: QueryExecutor,
    mapping: NameMapping,
    table_name: String,
}

impl LoadedStore {
    /// Create the table and load every row of `dataset` into it.
    ///
    /// Numeric columns are stored as REAL, everything else as TEXT. A cell
    /// that cannot be read as its column's type is stored as NULL.
    pub fn build(dataset: &ParsedDataset, table_name: &str) -> Result<Self> {
        let mapping = NameMapping::build(dataset.columns.iter().map(|c| c.name.as_str()));

        let mut executor = QueryExecutor::new();
        let ddl = create_table_sql(dataset, &mapping, table_name)?;
        executor.execute(QueryParser::parse(&ddl)?)?;

        let rows = dataset
            .rows
            .iter()
            .map(|record| coerce_row(dataset, record))
            .collect();
        executor.execute(Query::Insert {
            table_name: table_name.to_string(),
            rows,
        })?;

        debug!(
            table = table_name,
            columns = mapping.len(),
            rows = dataset.total_rows(),
            "built in-memory store"
        );

        Ok(Self {
            executor,
            mapping,
            table_name: table_name.to_string(),
        })
    }

    pub fn mapping(&self) -> &NameMapping {
        &self.mapping
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn row_count(&self) -> usize {
        self.executor
            .get_table(&self.table_name)
            .map(|t| t.row_count())
            .unwrap_or(0)
    }

    /// Run an already translated SELECT and key the rows by dataset column names
    pub fn query(&self, sql: &str) -> Result<Vec<ResultRow>> {
        match self.executor.query(sql)? {
            QueryResult::Rows { column_names, rows } => {
                let names: Vec<&str> = column_names
                    .iter()
                    .map(|name| self.mapping.restore(name))
                    .collect();

                Ok(rows
                    .iter()
                    .map(|row| {
                        names
                            .iter()
                            .zip(&row.values)
                            .map(|(name, value)| (name.to_string(), value.to_json()))
                            .collect()
                    })
                    .collect())
            }
            QueryResult::Message(message) => Err(QueryError::Unsupported(format!(
                "statement returned no rows: {}",
                message
            ))),
        }
    }
}

/// `CREATE TABLE "<table>" ("<col>" REAL, "<col>" TEXT, ...)` in column order
fn create_table_sql(dataset: &ParsedDataset, mapping: &NameMapping, table_name: &str) -> Result<String> {
    let columns = dataset
        .columns
        .iter()
        .map(|column| {
            let internal = mapping
                .internal(&column.name)
                .ok_or_else(|| QueryError::Load(format!("column '{}' has no identifier", column.name)))?;
            let sql_type = match column.kind {
                ColumnKind::Numeric => "REAL",
                ColumnKind::Text | ColumnKind::Date => "TEXT",
            };
            Ok(format!("\"{}\" {}", internal, sql_type))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "CREATE TABLE \"{}\" ({})",
        table_name.replace('"', "\"\""),
        columns.join(", ")
    ))
}

fn coerce_row(dataset: &ParsedDataset, record: &Record) -> Vec<Value> {
    dataset
        .columns
        .iter()
        .map(|column| {
            let raw = dataset.value(record, &column.name);
            match column.kind {
                ColumnKind::Numeric => raw.and_then(parse_number).map_or(Value::Null, Value::Real),
                ColumnKind::Text | ColumnKind::Date => {
                    raw.map_or(Value::Null, |text| Value::Text(text.to_string()))
                }
            }
        })
        .collect()
}
