// Query translation
// Rewrites column names as the user wrote them into the identifiers stored in the table.
//
// A small lexer walks the query so string literals and comments are never
// touched. Outside of those, every whole-word, case-insensitive occurrence of
// a dataset column name becomes its double-quoted internal identifier.

use crate::naming::{is_reserved, NameMapping};

/// Word pairs that form a keyword phrase. A reserved-word column name that
/// sits in one of these positions is read as the keyword, not the column.
const KEYWORD_PHRASES: &[(&str, &str)] = &[
    ("group", "by"),
    ("order", "by"),
    ("partition", "by"),
    ("left", "join"),
    ("right", "join"),
    ("inner", "join"),
    ("outer", "join"),
    ("cross", "join"),
    ("full", "join"),
    ("left", "outer"),
    ("right", "outer"),
    ("full", "outer"),
    ("is", "null"),
    ("is", "not"),
    ("not", "null"),
    ("not", "in"),
    ("not", "like"),
    ("not", "between"),
    ("not", "exists"),
    ("union", "all"),
];

/// A column name ready for matching
struct Candidate<'a> {
    chars: Vec<char>,
    original: &'a str,
    internal: &'a str,
    /// Has at least one word character, so it can be matched unquoted.
    /// Names made only of spaces or symbols match only inside quotes.
    bare: bool,
}

/// Rewrite `query` so it refers to the internal identifiers in `mapping`.
///
/// Single-quoted strings and comments are copied verbatim. Quoted
/// identifiers (`"..."`, `` `...` ``, `[...]`) naming a column are
/// re-quoted with the internal identifier. Longer names win over shorter
/// ones that overlap them, and a name directly followed by `(` is left
/// alone because it is a function call.
pub fn translate(query: &str, mapping: &NameMapping) -> String {
    let mut candidates: Vec<Candidate> = mapping
        .entries()
        .filter(|(original, _)| !original.is_empty())
        .map(|(original, internal)| Candidate {
            chars: original.chars().collect(),
            original,
            internal,
            bare: original.chars().any(is_word_char),
        })
        .collect();
    candidates.sort_by(|a, b| b.chars.len().cmp(&a.chars.len()));

    let chars: Vec<char> = query.chars().collect();
    let mut out = String::with_capacity(query.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                let end = scan_quoted(&chars, i, '\'');
                out.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&c| c == '\n')
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = find_seq(&chars, i + 2, &['*', '/'])
                    .map(|p| p + 2)
                    .unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                i = end;
            }
            '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                let end = scan_quoted(&chars, i, close);
                let closed = end - i >= 2 && chars[end - 1] == close;
                if closed {
                    let content: String = chars[i + 1..end - 1].iter().collect();
                    let content = if c == '[' {
                        content
                    } else {
                        let doubled = format!("{}{}", close, close);
                        content.replace(&doubled, &close.to_string())
                    };
                    match find_quoted(&candidates, &content) {
                        Some(internal) => push_quoted(&mut out, internal),
                        None => out.extend(&chars[i..end]),
                    }
                } else {
                    out.extend(&chars[i..end]);
                }
                i = end;
            }
            _ => match match_at(&candidates, &chars, i) {
                Some((internal, len)) => {
                    push_quoted(&mut out, internal);
                    i += len;
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            },
        }
    }

    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Index just past a quoted run starting at `start`. A doubled closing
/// character inside the run is an escaped quote. Unterminated runs end at
/// the end of the input.
fn scan_quoted(chars: &[char], start: usize, close: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == close {
            if close != ']' && chars.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn find_seq(chars: &[char], from: usize, seq: &[char]) -> Option<usize> {
    if from > chars.len() {
        return None;
    }
    chars[from..]
        .windows(seq.len())
        .position(|w| w == seq)
        .map(|p| from + p)
}

fn push_quoted(out: &mut String, internal: &str) {
    out.push('"');
    out.push_str(internal);
    out.push('"');
}

/// Internal identifier for the content of a quoted identifier.
/// An exact spelling wins over a case-insensitive one.
fn find_quoted<'a>(candidates: &[Candidate<'a>], content: &str) -> Option<&'a str> {
    candidates
        .iter()
        .find(|c| c.original == content)
        .or_else(|| {
            let wanted: Vec<char> = content.chars().collect();
            candidates.iter().find(|c| {
                c.chars.len() == wanted.len()
                    && c.chars
                        .iter()
                        .zip(&wanted)
                        .all(|(a, b)| chars_eq_ignore_case(*a, *b))
            })
        })
        .map(|c| c.internal)
}

/// Try every column name at position `i`, longest first
fn match_at<'a>(candidates: &[Candidate<'a>], chars: &[char], i: usize) -> Option<(&'a str, usize)> {
    let prev = if i == 0 { None } else { Some(chars[i - 1]) };

    for candidate in candidates.iter().filter(|c| c.bare) {
        let name = &candidate.chars;
        let len = name.len();
        if i + len > chars.len() {
            continue;
        }

        // Whole-word boundaries, only where the name itself starts/ends with a word character
        if is_word_char(name[0]) && prev.is_some_and(is_word_char) {
            continue;
        }
        if is_word_char(name[len - 1]) && chars.get(i + len).copied().is_some_and(is_word_char) {
            continue;
        }

        if !chars[i..i + len]
            .iter()
            .zip(name)
            .all(|(a, b)| chars_eq_ignore_case(*a, *b))
        {
            continue;
        }

        if next_significant(chars, i + len) == Some('(') {
            continue;
        }

        if is_reserved(candidate.original) && in_keyword_phrase(chars, i, i + len) {
            continue;
        }

        return Some((candidate.internal, len));
    }

    None
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from.min(chars.len())..]
        .iter()
        .copied()
        .find(|c| !c.is_whitespace())
}

/// The word immediately before `start`, if only whitespace separates them
fn word_before(chars: &[char], start: usize) -> String {
    let mut end = start;
    while end > 0 && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    let mut begin = end;
    while begin > 0 && is_word_char(chars[begin - 1]) {
        begin -= 1;
    }
    chars[begin..end].iter().collect::<String>().to_lowercase()
}

/// The word immediately after `end`, if only whitespace separates them
fn word_after(chars: &[char], end: usize) -> String {
    let mut begin = end;
    while begin < chars.len() && chars[begin].is_whitespace() {
        begin += 1;
    }
    let mut stop = begin;
    while stop < chars.len() && is_word_char(chars[stop]) {
        stop += 1;
    }
    chars[begin..stop].iter().collect::<String>().to_lowercase()
}

fn in_keyword_phrase(chars: &[char], start: usize, end: usize) -> bool {
    let word: String = chars[start..end].iter().collect::<String>().to_lowercase();
    let before = word_before(chars, start);
    let after = word_after(chars, end);

    KEYWORD_PHRASES
        .iter()
        .any(|&(first, second)| (first == word && second == after) || (first == before && second == word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mapping(names: &[&str]) -> NameMapping {
        NameMapping::build(names.iter().copied())
    }

    #[test]
    fn test_names_with_spaces_and_unicode() {
        let m = mapping(&["환자 이름", "age"]);
        assert_eq!(
            translate(r#"SELECT "환자 이름" FROM data LIMIT 1"#, &m),
            r#"SELECT "환자_이름" FROM data LIMIT 1"#
        );
        assert_eq!(
            translate("SELECT 환자 이름, AGE FROM data", &m),
            r#"SELECT "환자_이름", "age" FROM data"#
        );
    }

    #[test]
    fn test_whole_words_only() {
        let m = mapping(&["age"]);
        assert_eq!(
            translate("SELECT AVG(age) AS average FROM data WHERE age_group = 1", &m),
            r#"SELECT AVG("age") AS average FROM data WHERE age_group = 1"#
        );
    }

    #[test]
    fn test_reserved_column_next_to_keywords() {
        let m = mapping(&["group"]);
        assert_eq!(
            translate("SELECT group, COUNT(*) FROM data GROUP BY group", &m),
            r#"SELECT "col_group", COUNT(*) FROM data GROUP BY "col_group""#
        );

        let m = mapping(&["null", "order"]);
        assert_eq!(
            translate("SELECT order FROM data WHERE null IS NOT NULL ORDER BY order", &m),
            r#"SELECT "col_order" FROM data WHERE "col_null" IS NOT NULL ORDER BY "col_order""#
        );
    }

    #[test]
    fn test_literals_and_comments_untouched() {
        let m = mapping(&["city"]);
        assert_eq!(
            translate("SELECT city FROM data WHERE city = 'city' -- city\n/* city */", &m),
            "SELECT \"city\" FROM data WHERE \"city\" = 'city' -- city\n/* city */"
        );
        assert_eq!(
            translate("SELECT 'it''s city' AS city", &m),
            r#"SELECT 'it''s city' AS "city""#
        );
    }

    #[test]
    fn test_function_names_are_not_columns() {
        let m = mapping(&["count", "amount"]);
        assert_eq!(
            translate("SELECT count, COUNT(*) AS n, SUM(amount) FROM data", &m),
            r#"SELECT "count", COUNT(*) AS n, SUM("amount") FROM data"#
        );
    }

    #[test]
    fn test_longest_name_wins() {
        let m = mapping(&["age", "age group"]);
        assert_eq!(
            translate("SELECT age group, age FROM data", &m),
            r#"SELECT "age_group", "age" FROM data"#
        );
    }

    #[test]
    fn test_punctuated_names() {
        let m = mapping(&["price ($)", "2023 total"]);
        assert_eq!(
            translate("SELECT price ($), `2023 total`, [price ($)] FROM data", &m),
            r#"SELECT "price____", "_2023_total", "price____" FROM data"#
        );
    }

    #[test]
    fn test_symbol_only_names_need_quotes() {
        let m = mapping(&["id", " ", "-", "%", "city"]);
        let query = "SELECT city FROM data WHERE id - 1 = 0 AND city LIKE '%a'";
        assert_eq!(
            translate(query, &m),
            r#"SELECT "city" FROM data WHERE "id" - 1 = 0 AND "city" LIKE '%a'"#
        );
        assert_eq!(
            translate(r#"SELECT " ", "-", [%] FROM data"#, &m),
            r#"SELECT "_", "__2", "__3" FROM data"#
        );
    }

    #[test]
    fn test_unknown_quoted_identifiers_are_kept() {
        let m = mapping(&["a"]);
        assert_eq!(
            translate(r#"SELECT "b" FROM data"#, &m),
            r#"SELECT "b" FROM data"#
        );
    }

    proptest! {
        #[test]
        fn each_standalone_occurrence_is_replaced_once(
            name in "[a-z]{3,8}",
            repeats in 1usize..5,
        ) {
            prop_assume!(!is_reserved(&name));
            let m = mapping(&[name.as_str()]);
            let query = vec![name.to_uppercase(); repeats].join(" + ");
            let expected = vec![format!("\"{}\"", name); repeats].join(" + ");
            prop_assert_eq!(translate(&query, &m), expected);
        }

        #[test]
        fn embedded_occurrences_are_left_alone(name in "[a-z]{3,8}") {
            let m = mapping(&[name.as_str()]);
            let query = format!("x{}y {}_2", name, name);
            prop_assert_eq!(translate(&query, &m), query);
        }
    }
}
