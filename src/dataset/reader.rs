// CSV reader
// Header row names the columns; every later line becomes one record

use super::{ParsedDataset, Record};
use crate::error::DatasetError;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Read a CSV file from disk
pub fn read_path(path: impl AsRef<Path>) -> Result<ParsedDataset, DatasetError> {
    let file = std::fs::File::open(path.as_ref())?;
    let dataset = read(file)?;
    debug!(
        path = %path.as_ref().display(),
        rows = dataset.total_rows(),
        columns = dataset.columns.len(),
        "loaded CSV"
    );
    Ok(dataset)
}

/// Read CSV text from any reader.
///
/// Header names are trimmed. Blank lines are skipped. Short records simply
/// lack the trailing columns; fields beyond the header are dropped. Repeated
/// header names get `_1`, `_2`, ... so column names stay unique.
pub fn read<R: Read>(reader: R) -> Result<ParsedDataset, DatasetError> {
    let mut csv_reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let raw_headers = csv_reader.headers()?.clone();
    if raw_headers.is_empty() {
        return Err(DatasetError::MissingHeader);
    }
    let headers = unique_headers(raw_headers.iter());

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let row: Record = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(ParsedDataset::from_rows(headers, rows))
}

fn unique_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();

    for (idx, name) in raw.enumerate() {
        // Spreadsheet exports often start with a byte order mark
        let name = if idx == 0 {
            name.trim_start_matches('\u{feff}')
        } else {
            name
        };
        let name = name.trim();

        let mut unique = name.to_string();
        let mut n = 1;
        while !seen.insert(unique.clone()) {
            unique = format!("{}_{}", name, n);
            n += 1;
        }
        headers.push(unique);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnKind;

    #[test]
    fn test_read_infers_columns() {
        let text = "환자 이름,age,visit\n김영희,30,2023-01-02\n이철수,,2023-02-03\n\n박미영,41,2023-03-04\n";
        let dataset = read(text.as_bytes()).unwrap();

        let names: Vec<&str> = dataset.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["환자 이름", "age", "visit"]);
        assert_eq!(dataset.columns[1].kind, ColumnKind::Numeric);
        assert_eq!(dataset.columns[2].kind, ColumnKind::Date);
        assert_eq!(dataset.total_rows(), 3);
        assert_eq!(dataset.rows[1]["age"], "");
    }

    #[test]
    fn test_short_rows_and_duplicate_headers() {
        let text = "\u{feff}a,a,b\n1,2\n";
        let dataset = read(text.as_bytes()).unwrap();

        let names: Vec<&str> = dataset.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a_1", "b"]);
        assert_eq!(dataset.rows[0].get("a_1").map(String::as_str), Some("2"));
        assert!(!dataset.rows[0].contains_key("b"));
    }

    #[test]
    fn test_headers_are_trimmed() {
        let text = "id, age , \n1,30,x\n";
        let dataset = read(text.as_bytes()).unwrap();

        let names: Vec<&str> = dataset.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "age", ""]);
        assert_eq!(dataset.rows[0]["age"], "30");
        assert_eq!(dataset.rows[0][""], "x");
    }

    #[test]
    fn test_quoted_fields() {
        let text = "name,note\n\"Kim, Y\",\"said \"\"hi\"\"\"\n";
        let dataset = read(text.as_bytes()).unwrap();
        assert_eq!(dataset.rows[0]["name"], "Kim, Y");
        assert_eq!(dataset.rows[0]["note"], "said \"hi\"");
    }
}
