// Built-in demo dataset: ten employees across six columns

use super::{ColumnKind, DatasetColumn, ParsedDataset, Record};

const HEADERS: [&str; 6] = ["id", "name", "age", "city", "salary", "join_date"];

const ROWS: [[&str; 6]; 10] = [
    ["1", "홍길동", "25", "서울", "3500000", "2023-01-15"],
    ["2", "김영희", "30", "부산", "4200000", "2022-08-20"],
    ["3", "이철수", "28", "대구", "3800000", "2023-03-10"],
    ["4", "박미영", "32", "인천", "4500000", "2021-12-05"],
    ["5", "정대한", "27", "광주", "3600000", "2023-05-22"],
    ["6", "최순영", "29", "대전", "4000000", "2022-11-18"],
    ["7", "강민수", "26", "울산", "3700000", "2023-02-28"],
    ["8", "윤수정", "31", "창원", "4300000", "2022-06-12"],
    ["9", "임태영", "33", "고양", "4600000", "2021-09-15"],
    ["10", "송미라", "24", "수원", "3400000", "2023-07-08"],
];

/// The sample dataset offered when no file is loaded
pub fn sample_dataset() -> ParsedDataset {
    let kinds = [
        ColumnKind::Numeric,
        ColumnKind::Text,
        ColumnKind::Numeric,
        ColumnKind::Text,
        ColumnKind::Numeric,
        ColumnKind::Date,
    ];

    let columns = HEADERS
        .iter()
        .zip(kinds)
        .enumerate()
        .map(|(idx, (name, kind))| DatasetColumn {
            name: name.to_string(),
            kind,
            samples: ROWS.iter().take(5).map(|row| row[idx].to_string()).collect(),
        })
        .collect();

    let rows = ROWS
        .iter()
        .map(|row| {
            HEADERS
                .iter()
                .zip(row.iter())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Record>()
        })
        .collect();

    ParsedDataset::new(columns, rows)
}
