// csvql - SQL over CSV files with natural column names
// This is the library root that exposes the public API

pub mod dataset;
pub mod engine;
pub mod error;
pub mod format;
pub mod naming;
pub mod query;
pub mod storage;

// Re-export commonly used types for convenience
pub use dataset::{sample_dataset, ColumnKind, DatasetColumn, ParsedDataset};
pub use engine::{EngineConfig, FingerprintMode, LoadedStore, QueryEngine, QueryOutcome, ResultSource};
pub use error::{DatasetError, QueryError, Result};
pub use naming::{sanitize, NameMapping};
pub use query::{fallback::fallback_execute, translate, ResultRow};
