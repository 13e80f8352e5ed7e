// Query Executor
// Owns the tables and runs parsed statements against them

use super::expr::group_key;
use super::parser::{Query, QueryParser, SelectStatement};
use super::plan::{SelectPlan, SortTarget};
use crate::error::{QueryError, Result};
use crate::storage::{table::Table, GroupKey, Row, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// The query executor manages all tables and executes queries
pub struct QueryExecutor {
    /// Tables by lowercased name
    tables: HashMap<String, Table>,
}

/// Represents the result of a query execution
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows returned from a SELECT query
    Rows {
        column_names: Vec<String>,
        rows: Vec<Row>,
    },
    /// A message (for CREATE TABLE and INSERT)
    Message(String),
}

/// One output row before ORDER BY / LIMIT are applied
struct OutputRow {
    values: Vec<Value>,
    sort_keys: Vec<Value>,
}

impl QueryExecutor {
    /// Create a new query executor (empty database)
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Parse and run a read-only statement
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        match QueryParser::parse(sql)? {
            Query::Select(stmt) => self.select(&stmt),
            _ => Err(QueryError::Unsupported(
                "only SELECT statements can be run against a dataset".to_string(),
            )),
        }
    }

    /// Execute a query and return the result
    pub fn execute(&mut self, query: Query) -> Result<QueryResult> {
        match query {
            Query::CreateTable { name, schema } => {
                let key = name.to_lowercase();
                if self.tables.contains_key(&key) {
                    return Err(QueryError::Schema(format!("table '{}' already exists", name)));
                }

                let table = Table::new(name.clone(), schema)?;
                self.tables.insert(key, table);

                Ok(QueryResult::Message(format!("Table '{}' created", name)))
            }

            Query::Insert { table_name, rows } => {
                let table = self
                    .tables
                    .get_mut(&table_name.to_lowercase())
                    .ok_or_else(|| QueryError::UnknownTable(table_name.clone()))?;

                let count = table.insert_many(rows)?;

                Ok(QueryResult::Message(format!(
                    "{} row(s) inserted into '{}'",
                    count, table_name
                )))
            }

            Query::Select(stmt) => self.select(&stmt),
        }
    }

    /// Bind a SELECT against its table and run it
    fn select(&self, stmt: &SelectStatement) -> Result<QueryResult> {
        let schema = match &stmt.table_name {
            Some(name) => Some(self.table(name)?.get_schema()),
            None => None,
        };
        let plan = SelectPlan::bind(stmt, schema)?;
        self.execute_select(&plan)
    }

    /// Run a bound SELECT plan
    pub fn execute_select(&self, plan: &SelectPlan) -> Result<QueryResult> {
        // A FROM-less SELECT sees exactly one empty row
        let single = [Row::new(Vec::new())];
        let source: &[Row] = match &plan.table_name {
            Some(name) => self.table(name)?.scan(),
            None => &single,
        };

        let mut matched = Vec::new();
        for row in source {
            let keep = match &plan.filter {
                Some(filter) => filter.eval(&row.values, &[])?.truthy() == Some(true),
                None => true,
            };
            if keep {
                matched.push(row);
            }
        }

        let mut output = if plan.is_grouped() {
            Self::project_groups(plan, &matched)?
        } else {
            matched
                .iter()
                .map(|row| Self::project(plan, &row.values, &[]))
                .collect::<Result<Vec<_>>>()?
        };

        if plan.distinct {
            let mut seen: HashSet<Vec<GroupKey>> = HashSet::new();
            output.retain(|row| seen.insert(row.values.iter().map(Value::group_key).collect()));
        }

        if !plan.order_by.is_empty() {
            // Stable sort, so ties keep their scan / first-seen order
            output.sort_by(|a, b| {
                for (key, (x, y)) in plan
                    .order_by
                    .iter()
                    .zip(a.sort_keys.iter().zip(b.sort_keys.iter()))
                {
                    let ordering = x.sort_cmp(y);
                    let ordering = if key.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let rows = output
            .into_iter()
            .skip(plan.offset)
            .take(plan.limit.unwrap_or(usize::MAX))
            .map(|row| Row::new(row.values))
            .collect();

        Ok(QueryResult::Rows {
            column_names: plan.output_names.clone(),
            rows,
        })
    }

    /// Fold matched rows into groups and project one output row per group
    fn project_groups(plan: &SelectPlan, matched: &[&Row]) -> Result<Vec<OutputRow>> {
        let mut order: Vec<Vec<&Row>> = Vec::new();
        if plan.group_by.is_empty() {
            // Aggregates without GROUP BY: one group, even over zero rows
            order.push(matched.to_vec());
        } else {
            let mut index: HashMap<Vec<GroupKey>, usize> = HashMap::new();
            for &row in matched {
                let key = group_key(&plan.group_by, &row.values)?;
                match index.get(&key) {
                    Some(&slot) => order[slot].push(row),
                    None => {
                        index.insert(key, order.len());
                        order.push(vec![row]);
                    }
                }
            }
        }

        let mut output = Vec::with_capacity(order.len());
        for rows in order {
            let aggregates = plan
                .aggregates
                .iter()
                .map(|call| call.evaluate(&rows))
                .collect::<Result<Vec<_>>>()?;

            // Bare columns take their value from the group's first row;
            // an empty group reads every column as NULL
            let representative: &[Value] = match rows.first() {
                Some(row) => &row.values,
                None => &[],
            };

            if let Some(having) = &plan.having {
                if having.eval(representative, &aggregates)?.truthy() != Some(true) {
                    continue;
                }
            }

            output.push(Self::project(plan, representative, &aggregates)?);
        }
        Ok(output)
    }

    fn project(plan: &SelectPlan, row: &[Value], aggregates: &[Value]) -> Result<OutputRow> {
        let values = plan
            .projection
            .iter()
            .map(|expr| expr.eval(row, aggregates))
            .collect::<Result<Vec<_>>>()?;

        let sort_keys = plan
            .order_by
            .iter()
            .map(|key| match &key.target {
                SortTarget::Output(idx) => Ok(values[*idx].clone()),
                SortTarget::Expr(expr) => expr.eval(row, aggregates),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OutputRow { values, sort_keys })
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(&name.to_lowercase())
            .ok_or_else(|| QueryError::UnknownTable(name.to_string()))
    }

    /// Get a reference to a table (useful for direct access)
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    /// List all tables in the database
    pub fn list_tables(&self) -> Vec<String> {
        self.tables.values().map(|t| t.name.clone()).collect()
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn executor() -> QueryExecutor {
        let mut db = QueryExecutor::new();
        db.execute(QueryParser::parse("CREATE TABLE data (city TEXT, salary REAL, age REAL)").unwrap())
            .unwrap();
        db.execute(Query::Insert {
            table_name: "data".to_string(),
            rows: vec![
                vec![text("Seoul"), Value::Real(100.0), Value::Real(30.0)],
                vec![text("Busan"), Value::Real(80.0), Value::Real(25.0)],
                vec![text("Seoul"), Value::Real(120.0), Value::Real(41.0)],
                vec![Value::Null, Value::Null, Value::Real(35.0)],
            ],
        })
        .unwrap();
        db
    }

    fn rows(result: QueryResult) -> Vec<Vec<Value>> {
        match result {
            QueryResult::Rows { rows, .. } => rows.into_iter().map(|r| r.values).collect(),
            QueryResult::Message(msg) => panic!("expected rows, got message {}", msg),
        }
    }

    #[test]
    fn test_select_where_order_limit() {
        let db = executor();
        let result = db
            .query("SELECT city, salary FROM data WHERE salary >= 90 ORDER BY salary DESC LIMIT 1")
            .unwrap();
        assert_eq!(rows(result), vec![vec![text("Seoul"), Value::Real(120.0)]]);
    }

    #[test]
    fn test_group_by_with_count_and_order() {
        let db = executor();
        let result = db
            .query("SELECT city, COUNT(*) AS n FROM data GROUP BY city ORDER BY n DESC, city")
            .unwrap();
        assert_eq!(
            rows(result),
            vec![
                vec![text("Seoul"), Value::Integer(2)],
                vec![Value::Null, Value::Integer(1)],
                vec![text("Busan"), Value::Integer(1)],
            ]
        );
    }

    #[test]
    fn test_having_filters_groups() {
        let db = executor();
        let result = db
            .query("SELECT city, AVG(salary) FROM data GROUP BY city HAVING COUNT(*) > 1")
            .unwrap();
        assert_eq!(rows(result), vec![vec![text("Seoul"), Value::Real(110.0)]]);
    }

    #[test]
    fn test_aggregate_over_empty_selection() {
        let db = executor();
        let result = db
            .query("SELECT COUNT(*), SUM(salary) FROM data WHERE age > 100")
            .unwrap();
        assert_eq!(rows(result), vec![vec![Value::Integer(0), Value::Null]]);
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let db = executor();
        let result = db.query("SELECT * FROM data WHERE city = 'Daegu'").unwrap();
        assert_eq!(
            result,
            QueryResult::Rows {
                column_names: vec!["city".into(), "salary".into(), "age".into()],
                rows: Vec::new(),
            }
        );
    }

    #[test]
    fn test_predicates() {
        let db = executor();
        let count = |sql: &str| match db.query(sql).unwrap() {
            QueryResult::Rows { rows, .. } => rows.len(),
            QueryResult::Message(_) => 0,
        };
        assert_eq!(count("SELECT * FROM data WHERE city LIKE 'se%'"), 2);
        assert_eq!(count("SELECT * FROM data WHERE age BETWEEN 25 AND 35"), 3);
        assert_eq!(count("SELECT * FROM data WHERE city IN ('Busan', 'Daegu')"), 1);
        assert_eq!(count("SELECT * FROM data WHERE city IS NULL"), 1);
        assert_eq!(count("SELECT * FROM data WHERE NOT (salary > 90)"), 1);
        assert_eq!(count("SELECT DISTINCT city FROM data"), 3);
        assert_eq!(count("SELECT * FROM data LIMIT 2 OFFSET 3"), 1);
    }

    #[test]
    fn test_fromless_select() {
        let db = QueryExecutor::new();
        let result = db.query("SELECT 1 + 2 AS three").unwrap();
        assert_eq!(rows(result), vec![vec![Value::Integer(3)]]);
    }

    #[test]
    fn test_unknown_table_and_writes() {
        let db = executor();
        assert_eq!(
            db.query("SELECT * FROM missing").unwrap_err(),
            QueryError::UnknownTable("missing".into())
        );
        assert!(matches!(
            db.query("CREATE TABLE other (a TEXT)"),
            Err(QueryError::Unsupported(_))
        ));
    }

    #[test]
    fn test_duplicate_table() {
        let mut db = executor();
        let again = QueryParser::parse("CREATE TABLE DATA (x TEXT)").unwrap();
        assert!(matches!(db.execute(again), Err(QueryError::Schema(_))));
        assert_eq!(db.list_tables(), vec!["data".to_string()]);
        assert_eq!(db.get_table("data").map(|t| t.row_count()), Some(4));
    }
}
