// Dataset fingerprints
// A cheap identity for a dataset, used to decide whether the cached store is stale

use crate::dataset::ParsedDataset;
use seahash::SeaHasher;
use std::hash::{Hash, Hasher};

/// How much of the dataset goes into a fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintMode {
    /// Every cell. Any change to the data triggers a rebuild.
    #[default]
    Full,
    /// Column metadata, the row count and the first `rows` rows.
    /// Edits past that point go unnoticed until the row count changes.
    Sampled { rows: usize },
}

/// Hash a dataset's columns and cells, walking cells in column order
pub fn fingerprint(dataset: &ParsedDataset, mode: FingerprintMode) -> u64 {
    let mut hasher = SeaHasher::new();

    dataset.columns.len().hash(&mut hasher);
    for column in &dataset.columns {
        column.name.hash(&mut hasher);
        column.kind.hash(&mut hasher);
    }
    dataset.total_rows().hash(&mut hasher);

    let limit = match mode {
        FingerprintMode::Full => dataset.rows.len(),
        FingerprintMode::Sampled { rows } => rows,
    };
    for record in dataset.rows.iter().take(limit) {
        for column in &dataset.columns {
            // Missing and empty cells both load as NULL
            dataset.value(record, &column.name).hash(&mut hasher);
        }
    }

    hasher.finish()
}
