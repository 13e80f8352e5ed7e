// Query module - handles SQL parsing, translation and execution
pub mod executor;
pub mod expr;
pub mod fallback;
pub mod parser;
pub mod plan;
pub mod translate;

pub use executor::{QueryExecutor, QueryResult};
pub use parser::QueryParser;
pub use translate::translate;

/// One result row: column name to JSON value, in column order
pub type ResultRow = serde_json::Map<String, serde_json::Value>;
