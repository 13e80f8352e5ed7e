// Fallback executor
// Pattern-matches a handful of common query shapes directly against the
// parsed dataset. Only used when the engine could not answer a query.

use super::ResultRow;
use crate::dataset::{parse_number, ColumnKind, ParsedDataset};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::debug;

/// Rows returned when no pattern matches
pub const DEFAULT_ROW_LIMIT: usize = 100;

/// Category used for rows with no value in the grouped column
pub const MISSING_CATEGORY: &str = "Other";

/// Which canned answer the fallback produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    GroupCount,
    RowCount,
    Average,
    RawRows,
}

/// Answer `query` without SQL. Never fails.
///
/// The query is lowercased and trimmed, then checked against these shapes
/// in order:
/// - `count(*)`: `{total_rows, columns}`
/// - `group by` together with a `count(` over an expression: counts per
///   value of the first text column, largest group first
/// - `avg(`: mean of the first numeric column over all rows, rounded
/// - anything else: the first `row_limit` rows as stored
///
/// A shape whose column does not exist falls through to the next one.
pub fn fallback_execute(dataset: &ParsedDataset, query: &str, row_limit: usize) -> Vec<ResultRow> {
    let normalized = query.trim().to_lowercase();

    let counted = || {
        normalized
            .contains("count(*)")
            .then(|| (Pattern::RowCount, row_count(dataset)))
    };
    let grouped = || {
        if normalized.contains("group by") && normalized.contains("count(") {
            group_count(dataset).map(|rows| (Pattern::GroupCount, rows))
        } else {
            None
        }
    };
    let averaged = || {
        if normalized.contains("avg(") {
            average(dataset).map(|rows| (Pattern::Average, rows))
        } else {
            None
        }
    };

    let (pattern, rows) = counted()
        .or_else(grouped)
        .or_else(averaged)
        .unwrap_or_else(|| (Pattern::RawRows, raw_rows(dataset, row_limit)));

    debug!(?pattern, rows = rows.len(), "fallback answered query");
    rows
}

fn row_count(dataset: &ParsedDataset) -> Vec<ResultRow> {
    let mut row = ResultRow::new();
    row.insert("total_rows".into(), JsonValue::from(dataset.total_rows()));
    row.insert("columns".into(), JsonValue::from(dataset.columns.len()));
    vec![row]
}

fn group_count(dataset: &ParsedDataset) -> Option<Vec<ResultRow>> {
    let column = dataset.columns.iter().find(|c| c.kind == ColumnKind::Text)?;

    // Keep first-seen order so equal counts stay stable
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in &dataset.rows {
        let category = dataset
            .value(record, &column.name)
            .unwrap_or(MISSING_CATEGORY)
            .to_string();
        match index.get(&category) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(category.clone(), counts.len());
                counts.push((category, 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let rows = counts
        .into_iter()
        .map(|(category, count)| {
            let mut row = ResultRow::new();
            row.insert(column.name.clone(), JsonValue::String(category));
            row.insert("count".into(), JsonValue::from(count));
            row
        })
        .collect();
    Some(rows)
}

fn average(dataset: &ParsedDataset) -> Option<Vec<ResultRow>> {
    let column = dataset.columns.iter().find(|c| c.kind == ColumnKind::Numeric)?;
    let key = format!("avg_{}", column.name);

    let mut row = ResultRow::new();
    if dataset.rows.is_empty() {
        // No rows, no mean
        row.insert(key, JsonValue::Null);
        return Some(vec![row]);
    }

    // Missing and unparsable values count as zero
    let sum: f64 = dataset
        .rows
        .iter()
        .filter_map(|record| dataset.value(record, &column.name))
        .filter_map(parse_number)
        .sum();
    let mean = sum / dataset.total_rows() as f64;

    row.insert(key, round_half_up(mean));
    Some(vec![row])
}

fn round_half_up(value: f64) -> JsonValue {
    let rounded = (value + 0.5).floor();
    if rounded.abs() < i64::MAX as f64 {
        JsonValue::from(rounded as i64)
    } else {
        JsonValue::from(rounded)
    }
}

fn raw_rows(dataset: &ParsedDataset, limit: usize) -> Vec<ResultRow> {
    dataset
        .rows
        .iter()
        .take(limit)
        .map(|record| {
            dataset
                .columns
                .iter()
                .filter_map(|column| {
                    record
                        .get(&column.name)
                        .map(|value| (column.name.clone(), JsonValue::String(value.clone())))
                })
                .collect()
        })
        .collect()
}
