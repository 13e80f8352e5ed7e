// Dataset module - the parsed CSV as the rest of the crate sees it
// Column type inference and raw value parsing live here too

pub mod reader;
mod sample;

use crate::error::{QueryError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use sample::sample_dataset;

/// Number of rows inspected when inferring a column's type
pub const TYPE_DETECTION_ROWS: usize = 100;

/// Number of example values kept per column
pub const SAMPLE_VALUES: usize = 5;

/// A row as read from the file: column name to raw text.
/// A missing key and an empty string both mean "no value".
pub type Record = HashMap<String, String>;

/// Semantic type inferred for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Numeric,
    Date,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetColumn {
    pub name: String,
    pub kind: ColumnKind,
    /// A few non-empty raw values, for display
    pub samples: Vec<String>,
}

/// Columns plus rows of a parsed CSV file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDataset {
    pub columns: Vec<DatasetColumn>,
    pub rows: Vec<Record>,
}

/// Outcome of changing a column's type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionReport {
    pub converted: usize,
    /// Values that could not be read as the new type and were cleared
    pub failed: usize,
}

impl ParsedDataset {
    pub fn new(columns: Vec<DatasetColumn>, rows: Vec<Record>) -> Self {
        Self { columns, rows }
    }

    /// Build a dataset from headers and rows, inferring each column's type
    /// from the first [`TYPE_DETECTION_ROWS`] rows.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Record>) -> Self {
        let columns = headers
            .into_iter()
            .map(|name| {
                let values: Vec<&str> = rows
                    .iter()
                    .take(TYPE_DETECTION_ROWS)
                    .map(|row| row.get(&name).map(String::as_str).unwrap_or(""))
                    .collect();
                let kind = detect_column_type(&values);
                let samples = values
                    .iter()
                    .filter(|v| !v.trim().is_empty())
                    .take(SAMPLE_VALUES)
                    .map(|v| v.to_string())
                    .collect();
                DatasetColumn {
                    name,
                    kind,
                    samples,
                }
            })
            .collect();

        Self { columns, rows }
    }

    /// Always equal to the number of rows
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<&DatasetColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Raw value of a cell; empty and missing values are both None
    pub fn value<'a>(&'a self, row: &'a Record, column: &str) -> Option<&'a str> {
        row.get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Change a column's type, normalizing its values to the new type.
    ///
    /// Numeric conversion keeps digits, `.` and `-` and rewrites the value as a
    /// plain number; date conversion rewrites values as `YYYY-MM-DD`. Values
    /// that cannot be converted are cleared. Converting to text keeps values.
    pub fn set_column_kind(&mut self, name: &str, kind: ColumnKind) -> Result<ConversionReport> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))?;
        column.kind = kind;

        let mut report = ConversionReport::default();
        for row in &mut self.rows {
            let Some(raw) = row.get_mut(name) else {
                continue;
            };
            if raw.trim().is_empty() {
                continue;
            }

            let converted = match kind {
                ColumnKind::Text => Some(raw.clone()),
                ColumnKind::Numeric => {
                    let cleaned: String = raw
                        .chars()
                        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                        .collect();
                    parse_number(&cleaned).map(|n| n.to_string())
                }
                ColumnKind::Date => {
                    parse_date(raw).map(|d| d.format("%Y-%m-%d").to_string())
                }
            };

            match converted {
                Some(value) => {
                    *raw = value;
                    report.converted += 1;
                }
                None => {
                    raw.clear();
                    report.failed += 1;
                }
            }
        }

        column_samples(&self.rows, name, &mut self.columns);
        Ok(report)
    }
}

/// Refresh the sample values of one column after its values changed
fn column_samples(rows: &[Record], name: &str, columns: &mut [DatasetColumn]) {
    if let Some(column) = columns.iter_mut().find(|c| c.name == name) {
        column.samples = rows
            .iter()
            .filter_map(|row| row.get(name))
            .filter(|v| !v.trim().is_empty())
            .take(SAMPLE_VALUES)
            .cloned()
            .collect();
    }
}

/// Parse a raw cell as a number.
/// Thousands separators (`,`) are ignored; empty, unparsable and
/// non-finite values give None.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a raw cell as a calendar date (time of day is dropped)
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%m/%d/%Y", "%d-%m-%Y"];
    const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Infer a column's type from raw values.
///
/// Numeric when more than 80% of non-empty values parse as numbers, date
/// when more than 70% parse as dates, text otherwise (including when every
/// value is empty).
pub fn detect_column_type(values: &[&str]) -> ColumnKind {
    let non_empty: Vec<&str> = values
        .iter()
        .copied()
        .filter(|v| !v.trim().is_empty())
        .collect();
    if non_empty.is_empty() {
        return ColumnKind::Text;
    }

    let total = non_empty.len() as f64;
    let numbers = non_empty.iter().filter(|v| parse_number(v).is_some()).count();
    if numbers as f64 / total > 0.8 {
        return ColumnKind::Numeric;
    }

    let dates = non_empty.iter().filter(|v| parse_date(v).is_some()).count();
    if dates as f64 / total > 0.7 {
        return ColumnKind::Date;
    }

    ColumnKind::Text
}
