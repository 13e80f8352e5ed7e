// Storage module - the in-memory relational store
// Values, rows, schemas and the table that holds them

pub mod table;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single row in a table; one value per schema column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// A value stored in (or computed from) the table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

/// Hashable identity of a value, used for GROUP BY and DISTINCT.
/// Integers and reals that are numerically equal share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Null,
    Number(u64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one without coercion
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Null | Value::Text(_) => None,
        }
    }

    /// Numeric view used by arithmetic: text that looks like a number is
    /// read as one, any other text counts as 0.
    pub fn coerce_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Text(s) => Some(s.trim().parse::<f64>().unwrap_or(0.0)),
            other => other.as_f64(),
        }
    }

    /// SQL truthiness. NULL is unknown.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Boolean(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            Value::Real(r) => Some(*r != 0.0),
            Value::Text(s) => Some(s.trim().parse::<f64>().map(|n| n != 0.0).unwrap_or(false)),
        }
    }

    /// Compare two values of compatible types.
    /// Returns None when either side is NULL or the types cannot be compared.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Text(_), _) | (_, Value::Text(_)) => None,
            (a, b) => {
                let (a, b) = (a.as_f64()?, b.as_f64()?);
                a.partial_cmp(&b)
            }
        }
    }

    /// Total ordering for ORDER BY: NULL first, then numbers, then text
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::Null => 0,
                Value::Integer(_) | Value::Real(_) | Value::Boolean(_) => 1,
                Value::Text(_) => 2,
            }
        }

        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (a, b) if rank(a) == 1 && rank(b) == 1 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }

    pub fn group_key(&self) -> GroupKey {
        match self {
            Value::Null => GroupKey::Null,
            Value::Text(s) => GroupKey::Text(s.clone()),
            other => {
                let n = other.as_f64().unwrap_or(0.0);
                // -0.0 and 0.0 group together
                let n = if n == 0.0 { 0.0 } else { n };
                GroupKey::Number(n.to_bits())
            }
        }
    }

    /// Convert to a JSON value for result rows
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(r) => serde_json::Number::from_f64(*r)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Represents the schema (structure) of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

/// A single column definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

/// Storage types understood by the table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Find a column by name.
    /// An exact match wins; otherwise names are compared case-insensitively,
    /// the way SQL identifiers are.
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|col| col.name == name)
            .or_else(|| {
                let lowered = name.to_lowercase();
                self.columns
                    .iter()
                    .position(|col| col.name.to_lowercase() == lowered)
            })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_and_real_share_group_key() {
        assert_eq!(Value::Integer(3).group_key(), Value::Real(3.0).group_key());
        assert_ne!(Value::Integer(3).group_key(), Value::Text("3".into()).group_key());
    }

    #[test]
    fn test_compare_mixed_types() {
        assert_eq!(
            Value::Integer(2).compare(&Value::Real(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Text("a".into()).compare(&Value::Integer(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_sort_order_nulls_numbers_text() {
        let mut values = vec![
            Value::Text("b".into()),
            Value::Real(1.5),
            Value::Null,
            Value::Integer(-4),
        ];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Integer(-4),
                Value::Real(1.5),
                Value::Text("b".into())
            ]
        );
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let schema = Schema::new(vec![
            Column {
                name: "Amount".into(),
                data_type: DataType::Real,
                nullable: true,
            },
            Column {
                name: "amount_2".into(),
                data_type: DataType::Real,
                nullable: true,
            },
        ]);
        assert_eq!(schema.get_column_index("Amount"), Some(0));
        assert_eq!(schema.get_column_index("AMOUNT"), Some(0));
        assert_eq!(schema.get_column_index("missing"), None);
    }

    #[test]
    fn test_non_finite_real_serializes_as_null() {
        assert_eq!(Value::Real(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(Value::Integer(7).to_json(), serde_json::json!(7));
    }
}
