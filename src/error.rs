// Error types
// Every failure inside the query core is one of these variants

use thiserror::Error;

/// Errors raised while building the in-memory store or running a query
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// The SQL text could not be parsed
    #[error("SQL parsing error: {0}")]
    Parse(String),

    /// Valid SQL that this engine does not implement
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("no such column: {0}")]
    UnknownColumn(String),

    #[error("no such table: {0}")]
    UnknownTable(String),

    /// An operator or function was applied to values it cannot handle
    #[error("type error: {0}")]
    Type(String),

    /// The table definition is invalid (duplicate column, empty schema, ...)
    #[error("schema error: {0}")]
    Schema(String),

    /// Loading rows into the store failed
    #[error("load error: {0}")]
    Load(String),
}

/// Convenience alias used throughout the library
pub type Result<T> = std::result::Result<T, QueryError>;

impl From<sqlparser::parser::ParserError> for QueryError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        QueryError::Parse(err.to_string())
    }
}

/// Errors raised while reading a CSV file into a dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file has no header row to name the columns
    #[error("CSV file has no header row")]
    MissingHeader,
}
