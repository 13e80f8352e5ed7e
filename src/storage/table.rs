// Table implementation
// A table combines a schema with the rows stored under it

use super::{DataType, Row, Schema, Value};
use crate::error::{QueryError, Result};

/// Represents a database table
pub struct Table {
    /// The name of the table
    pub name: String,
    /// The schema (column definitions)
    pub schema: Schema,
    /// Rows in insertion order
    rows: Vec<Row>,
}

impl Table {
    /// Create a new, empty table
    pub fn new(name: String, schema: Schema) -> Result<Self> {
        if schema.is_empty() {
            return Err(QueryError::Schema(format!(
                "table '{}' must have at least one column",
                name
            )));
        }

        for (i, column) in schema.columns.iter().enumerate() {
            let lowered = column.name.to_lowercase();
            if schema.columns[..i]
                .iter()
                .any(|c| c.name.to_lowercase() == lowered)
            {
                return Err(QueryError::Schema(format!(
                    "duplicate column name: {}",
                    column.name
                )));
            }
        }

        Ok(Self {
            name,
            schema,
            rows: Vec::new(),
        })
    }

    /// Insert a row into the table.
    /// Integers stored into REAL columns are widened; any other type
    /// mismatch is rejected.
    pub fn insert(&mut self, values: Vec<Value>) -> Result<usize> {
        if values.len() != self.schema.columns.len() {
            return Err(QueryError::Load(format!(
                "expected {} values, got {}",
                self.schema.columns.len(),
                values.len()
            )));
        }

        let mut stored = Vec::with_capacity(values.len());
        for (value, column) in values.into_iter().zip(&self.schema.columns) {
            let value = match (column.data_type, value) {
                (_, Value::Null) if !column.nullable => {
                    return Err(QueryError::Load(format!(
                        "NOT NULL constraint failed: {}",
                        column.name
                    )));
                }
                (_, Value::Null) => Value::Null,
                (DataType::Real, Value::Integer(i)) => Value::Real(i as f64),
                (DataType::Real, v @ Value::Real(_))
                | (DataType::Integer, v @ Value::Integer(_))
                | (DataType::Text, v @ Value::Text(_))
                | (DataType::Boolean, v @ Value::Boolean(_)) => v,
                (data_type, v) => {
                    return Err(QueryError::Type(format!(
                        "cannot store {:?} in {:?} column '{}'",
                        v, data_type, column.name
                    )));
                }
            };
            stored.push(value);
        }

        self.rows.push(Row::new(stored));
        Ok(self.rows.len() - 1)
    }

    /// Insert many rows; stops at the first rejected row
    pub fn insert_many(&mut self, rows: Vec<Vec<Value>>) -> Result<usize> {
        self.rows.reserve(rows.len());
        let count = rows.len();
        for values in rows {
            self.insert(values)?;
        }
        Ok(count)
    }

    /// All rows, in insertion order
    pub fn scan(&self) -> &[Row] {
        &self.rows
    }

    /// Get the number of rows in the table
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the schema of the table
    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Column;

    fn schema() -> Schema {
        Schema::new(vec![
            Column {
                name: "name".into(),
                data_type: DataType::Text,
                nullable: true,
            },
            Column {
                name: "score".into(),
                data_type: DataType::Real,
                nullable: true,
            },
        ])
    }

    #[test]
    fn test_insert_widens_integers_into_real_columns() {
        let mut table = Table::new("data".into(), schema()).unwrap();
        table
            .insert(vec![Value::Text("a".into()), Value::Integer(3)])
            .unwrap();
        assert_eq!(table.scan()[0].values[1], Value::Real(3.0));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_insert_rejects_wrong_arity_and_type() {
        let mut table = Table::new("data".into(), schema()).unwrap();
        assert!(table.insert(vec![Value::Null]).is_err());
        assert!(table
            .insert(vec![Value::Real(1.0), Value::Real(2.0)])
            .is_err());
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_duplicate_columns_are_rejected() {
        let mut columns = schema().columns;
        columns.push(Column {
            name: "NAME".into(),
            data_type: DataType::Text,
            nullable: true,
        });
        assert!(matches!(
            Table::new("data".into(), Schema::new(columns)),
            Err(QueryError::Schema(_))
        ));
    }

    #[test]
    fn test_not_null_constraint() {
        let mut table = Table::new(
            "t".into(),
            Schema::new(vec![Column {
                name: "id".into(),
                data_type: DataType::Integer,
                nullable: false,
            }]),
        )
        .unwrap();
        assert!(table.insert(vec![Value::Null]).is_err());
        assert!(table.insert(vec![Value::Integer(1)]).is_ok());
    }
}
