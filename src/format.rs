// Result formatting for the terminal

use crate::query::ResultRow;
use serde_json::Value as JsonValue;

/// Render rows as a box-drawn table.
/// Columns appear in first-seen order across all rows; a cell missing from
/// a row is left blank.
pub fn format_table(rows: &[ResultRow]) -> String {
    if rows.is_empty() {
        return "No rows found".to_string();
    }

    let mut column_names: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !column_names.contains(&key.as_str()) {
                column_names.push(key);
            }
        }
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            column_names
                .iter()
                .map(|name| row.get(*name).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    // Calculate column widths
    let mut widths: Vec<usize> = column_names.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.chars().count());
        }
    }

    let mut result = String::new();
    border(&mut result, &widths, '┌', '┬', '┐');
    line(&mut result, column_names.iter().copied(), &widths);
    border(&mut result, &widths, '├', '┼', '┤');
    for row in &cells {
        line(&mut result, row.iter().map(String::as_str), &widths);
    }
    border(&mut result, &widths, '└', '┴', '┘');

    let noun = if rows.len() == 1 { "row" } else { "rows" };
    result.push_str(&format!("({} {})", rows.len(), noun));
    result
}

/// Render rows as a pretty-printed JSON array
pub fn format_json(rows: &[ResultRow]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rows)
}

fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn border(out: &mut String, widths: &[usize], left: char, middle: char, right: char) {
    out.push(left);
    for (i, width) in widths.iter().enumerate() {
        out.push_str(&"─".repeat(width + 2));
        if i < widths.len() - 1 {
            out.push(middle);
        }
    }
    out.push(right);
    out.push('\n');
}

fn line<'a>(out: &mut String, values: impl Iterator<Item = &'a str>, widths: &[usize]) {
    out.push('│');
    for (value, width) in values.zip(widths) {
        let pad = width - value.chars().count();
        out.push(' ');
        out.push_str(value);
        out.push_str(&" ".repeat(pad + 1));
        out.push('│');
    }
    out.push('\n');
}
