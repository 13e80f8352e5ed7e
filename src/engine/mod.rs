// Query engine
// Caches one in-memory store per dataset fingerprint, translates user queries
// onto it and falls back to pattern matching when a query cannot be run.

mod fingerprint;
mod loader;

pub use fingerprint::{fingerprint, FingerprintMode};
pub use loader::LoadedStore;

use crate::dataset::ParsedDataset;
use crate::error::Result;
use crate::naming::NameMapping;
use crate::query::fallback::{fallback_execute, DEFAULT_ROW_LIMIT};
use crate::query::{translate, ResultRow};
use tracing::{debug, warn};

/// Name of the table queries run against
pub const DEFAULT_TABLE_NAME: &str = "data";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Table the dataset is loaded into
    pub table_name: String,
    /// How the dataset is fingerprinted to detect changes
    pub fingerprint: FingerprintMode,
    /// Rows returned by the fallback when it returns raw rows
    pub fallback_row_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            fingerprint: FingerprintMode::default(),
            fallback_row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

/// Where a query's rows came from
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSource {
    Engine,
    /// The engine failed with `reason` and the fallback answered instead
    Fallback { reason: String },
}

/// Everything known about one executed query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub rows: Vec<ResultRow>,
    /// The query as submitted
    pub original: String,
    /// The query as run against the store; None if the store could not be built
    pub translated: Option<String>,
    pub source: ResultSource,
}

impl QueryOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ResultSource::Fallback { .. })
    }
}

struct CachedStore {
    fingerprint: u64,
    store: LoadedStore,
}

/// Runs queries against datasets, one query at a time.
///
/// The store is built on first use and rebuilt only when the dataset's
/// fingerprint changes. Each engine owns its own store.
pub struct QueryEngine {
    config: EngineConfig,
    cache: Option<CachedStore>,
    builds: usize,
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cache: None,
            builds: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of stores built so far
    pub fn build_count(&self) -> usize {
        self.builds
    }

    /// Name mapping of the cached store, if one has been built
    pub fn mapping(&self) -> Option<&NameMapping> {
        self.cache.as_ref().map(|cached| cached.store.mapping())
    }

    /// Run `query` against `dataset`. Never fails: if the engine cannot
    /// answer, the fallback does.
    pub fn execute(&mut self, dataset: &ParsedDataset, query: &str) -> Vec<ResultRow> {
        self.run(dataset, query).rows
    }

    /// Like [`execute`](Self::execute), also reporting the translated query
    /// and whether the fallback was used
    pub fn run(&mut self, dataset: &ParsedDataset, query: &str) -> QueryOutcome {
        let (translated, result) = self.run_primary(dataset, query);

        match result {
            Ok(rows) => QueryOutcome {
                rows,
                original: query.to_string(),
                translated,
                source: ResultSource::Engine,
            },
            Err(err) => {
                warn!(error = %err, query, "query failed, using fallback");
                let rows = fallback_execute(dataset, query, self.config.fallback_row_limit);
                QueryOutcome {
                    rows,
                    original: query.to_string(),
                    translated,
                    source: ResultSource::Fallback {
                        reason: err.to_string(),
                    },
                }
            }
        }
    }

    /// Run `query` on the store only, returning the engine's error instead
    /// of falling back
    pub fn try_execute(&mut self, dataset: &ParsedDataset, query: &str) -> Result<Vec<ResultRow>> {
        self.run_primary(dataset, query).1
    }

    fn run_primary(
        &mut self,
        dataset: &ParsedDataset,
        query: &str,
    ) -> (Option<String>, Result<Vec<ResultRow>>) {
        let store = match self.store_for(dataset) {
            Ok(store) => store,
            Err(err) => return (None, Err(err)),
        };

        let translated = translate(query, store.mapping());
        debug!(original = query, translated = %translated, "translated query");
        let result = store.query(&translated);
        (Some(translated), result)
    }

    /// The store for `dataset`, rebuilding it if the fingerprint changed
    fn store_for(&mut self, dataset: &ParsedDataset) -> Result<&LoadedStore> {
        let current = fingerprint(dataset, self.config.fingerprint);

        let cached = match self.cache.take() {
            Some(cached) if cached.fingerprint == current => cached,
            stale => {
                let store = LoadedStore::build(dataset, &self.config.table_name)?;
                self.builds += 1;
                debug!(
                    fingerprint = current,
                    replaced = stale.is_some(),
                    builds = self.builds,
                    "rebuilt store"
                );
                CachedStore {
                    fingerprint: current,
                    store,
                }
            }
        };

        Ok(&self.cache.insert(cached).store)
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
