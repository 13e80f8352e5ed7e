use super::sanitize;
use std::collections::{HashMap, HashSet};

/// Two-way map between dataset column names and the identifiers stored in the table.
///
/// Internal identifiers are unique ignoring case. When two names sanitize to
/// the same identifier, later columns get `_2`, `_3`, ... appended in column
/// order, so the mapping stays a bijection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameMapping {
    /// (original, internal) in column order
    entries: Vec<(String, String)>,
    by_original: HashMap<String, usize>,
    by_internal: HashMap<String, usize>,
}

impl NameMapping {
    pub fn build<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut mapping = Self::default();
        let mut taken: HashSet<String> = HashSet::new();

        for original in names {
            let base = sanitize(original);
            let mut internal = base.clone();
            let mut suffix = 2;
            while !taken.insert(internal.to_lowercase()) {
                internal = format!("{}_{}", base, suffix);
                suffix += 1;
            }

            let idx = mapping.entries.len();
            mapping.by_original.entry(original.to_string()).or_insert(idx);
            mapping.by_internal.insert(internal.clone(), idx);
            mapping.entries.push((original.to_string(), internal));
        }

        mapping
    }

    /// Internal identifier for a dataset column
    pub fn internal(&self, original: &str) -> Option<&str> {
        self.by_original
            .get(original)
            .map(|&idx| self.entries[idx].1.as_str())
    }

    /// Dataset column for an internal identifier
    pub fn original(&self, internal: &str) -> Option<&str> {
        self.by_internal
            .get(internal)
            .map(|&idx| self.entries[idx].0.as_str())
    }

    /// Map a result column name back to the dataset's spelling.
    /// Names the mapping does not know (aliases, expressions) pass through.
    pub fn restore<'a>(&'a self, name: &'a str) -> &'a str {
        self.original(name).unwrap_or(name)
    }

    /// (original, internal) pairs in column order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(o, i)| (o.as_str(), i.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
