// End-to-end behaviour of the query engine over CSV input

use csvql::dataset::reader;
use csvql::{fallback_execute, sample_dataset, ParsedDataset, QueryEngine, ResultSource};
use serde_json::json;

fn load(text: &str) -> ParsedDataset {
    reader::read(text.as_bytes()).unwrap()
}

fn keys(row: &csvql::ResultRow) -> Vec<&str> {
    row.keys().map(String::as_str).collect()
}

#[test]
fn quoted_column_with_space_and_hangul() {
    let dataset = load("환자 이름,나이\n김영희,30\n이철수,41\n");
    let mut engine = QueryEngine::default();

    let outcome = engine.run(&dataset, r#"SELECT "환자 이름" FROM data LIMIT 1"#);
    assert_eq!(outcome.source, ResultSource::Engine);
    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(keys(&outcome.rows[0]), vec!["환자 이름"]);
    assert_eq!(outcome.rows[0]["환자 이름"], json!("김영희"));
}

#[test]
fn reserved_word_column_in_group_by() {
    let dataset = load("group,score\nA,1\nB,2\nA,3\n");
    let mut engine = QueryEngine::default();

    let outcome = engine.run(&dataset, "SELECT group, COUNT(*) FROM data GROUP BY group");
    assert_eq!(outcome.source, ResultSource::Engine);
    assert_eq!(
        outcome.translated.as_deref(),
        Some(r#"SELECT "col_group", COUNT(*) FROM data GROUP BY "col_group""#)
    );
    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(keys(&outcome.rows[0]), vec!["group", "COUNT(*)"]);
    assert_eq!(outcome.rows[0]["group"], json!("A"));
    assert_eq!(outcome.rows[0]["COUNT(*)"], json!(2));
    assert_eq!(outcome.rows[1]["group"], json!("B"));
    assert_eq!(outcome.rows[1]["COUNT(*)"], json!(1));
}

#[test]
fn count_star_on_sample_dataset() {
    let dataset = sample_dataset();
    let mut engine = QueryEngine::default();

    let rows = engine.execute(&dataset, "SELECT COUNT(*) FROM data");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["COUNT(*)"], json!(10));

    let degraded = fallback_execute(&dataset, "SELECT COUNT(*) FROM data", 100);
    assert_eq!(degraded.len(), 1);
    assert_eq!(degraded[0]["total_rows"], json!(10));
    assert_eq!(degraded[0]["columns"], json!(6));
}

#[test]
fn unknown_column_returns_first_hundred_rows() {
    let mut text = String::from("id,city\n");
    for i in 0..150 {
        text.push_str(&format!("{},city{}\n", i, i));
    }
    let dataset = load(&text);
    let mut engine = QueryEngine::default();

    let outcome = engine.run(&dataset, "SELECT nonexistent FROM data");
    assert!(matches!(outcome.source, ResultSource::Fallback { .. }));
    assert_eq!(outcome.rows.len(), 100);
    assert_eq!(outcome.rows[0]["id"], json!("0"));
    assert_eq!(outcome.rows[99]["city"], json!("city99"));
}

#[test]
fn unchanged_dataset_builds_once_and_mutation_rebuilds() {
    let mut dataset = sample_dataset();
    let mut engine = QueryEngine::default();

    for _ in 0..5 {
        engine.execute(&dataset, "SELECT AVG(salary) FROM data");
    }
    assert_eq!(engine.build_count(), 1);

    dataset.rows[3].insert("salary".into(), "9,000,000".into());
    let rows = engine.execute(&dataset, "SELECT salary FROM data WHERE name = '박미영'");
    assert_eq!(engine.build_count(), 2);
    assert_eq!(rows[0]["salary"], json!(9_000_000.0));

    engine.execute(&dataset, "SELECT salary FROM data");
    assert_eq!(engine.build_count(), 2);
}

#[test]
fn select_star_keys_rows_by_original_names() {
    let dataset = load("환자 이름,price ($),2023 total,order\n김영희,\"1,200\",5,first\n이철수,,x,\n");
    let mut engine = QueryEngine::default();

    let rows = engine.try_execute(&dataset, "SELECT * FROM data").unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(keys(row), vec!["환자 이름", "price ($)", "2023 total", "order"]);
    }
    assert_eq!(rows[0]["price ($)"], json!(1200.0));
    assert_eq!(rows[1]["price ($)"], json!(null));
    assert_eq!(rows[0]["order"], json!("first"));
    assert_eq!(rows[1]["order"], json!(null));
}

#[test]
fn colliding_names_stay_distinct() {
    let dataset = load("a b,a-b,A_B\n1,2,3\n");
    let mut engine = QueryEngine::default();

    let rows = engine
        .try_execute(&dataset, r#"SELECT "a-b", [A_B], "a b" FROM data"#)
        .unwrap();
    assert_eq!(keys(&rows[0]), vec!["a-b", "A_B", "a b"]);
    assert_eq!(rows[0]["a b"], json!(1.0));
    assert_eq!(rows[0]["a-b"], json!(2.0));
    assert_eq!(rows[0]["A_B"], json!(3.0));

    let mapping = engine.mapping().unwrap();
    assert_eq!(mapping.internal("a b"), Some("a_b"));
    assert_eq!(mapping.internal("a-b"), Some("a_b_2"));
    assert_eq!(mapping.internal("A_B"), Some("A_B_3"));
}

#[test]
fn filters_sorting_and_aliases_over_natural_names() {
    let dataset = sample_dataset();
    let mut engine = QueryEngine::default();

    let rows = engine
        .try_execute(
            &dataset,
            "SELECT name, age * 12 AS months FROM data \
             WHERE city IN ('서울', '부산', '대구') AND join_date LIKE '2023%' \
             ORDER BY months DESC",
        )
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("이철수"));
    assert_eq!(rows[0]["months"], json!(336.0));
    assert_eq!(rows[1]["name"], json!("홍길동"));
}

#[test]
fn empty_result_is_not_a_failure() {
    let dataset = sample_dataset();
    let mut engine = QueryEngine::default();

    let outcome = engine.run(&dataset, "SELECT * FROM data WHERE age > 100");
    assert_eq!(outcome.source, ResultSource::Engine);
    assert!(outcome.rows.is_empty());
}

#[test]
fn blank_header_does_not_disturb_other_columns() {
    let dataset = load("id, ,city\n1,x,Seoul\n2,y,Busan\n");
    let mut engine = QueryEngine::default();

    let outcome = engine.run(&dataset, "SELECT city FROM data WHERE id = 1");
    assert_eq!(outcome.source, ResultSource::Engine);
    assert_eq!(
        outcome.translated.as_deref(),
        Some(r#"SELECT "city" FROM data WHERE "id" = 1"#)
    );
    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0]["city"], json!("Seoul"));
}

#[test]
fn grouped_count_star_falls_back_to_row_count() {
    let dataset = load("id,city\n1,Seoul\n2,Busan\n3,Seoul\n");
    let rows = fallback_execute(&dataset, "SELECT city, COUNT(*) FROM data GROUP BY city", 100);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["total_rows"], json!(3));
    assert_eq!(rows[0]["columns"], json!(2));
}
