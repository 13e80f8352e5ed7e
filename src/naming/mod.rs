// Column naming
// Turns arbitrary CSV header text into identifiers the SQL engine can store and query

mod mapping;

pub use mapping::NameMapping;

/// Keywords that cannot be used as bare column identifiers
pub const RESERVED_WORDS: &[&str] = &[
    "select", "from", "where", "group", "order", "by", "insert", "update", "delete", "table",
    "column", "index", "join", "inner", "outer", "left", "right", "union", "and", "or", "not",
    "null", "like", "between", "in", "exists", "case", "when", "then", "else", "end",
];

/// Prefix that moves a reserved word out of the keyword namespace
pub const RESERVED_PREFIX: &str = "col_";

/// Identifier used when a name has no characters at all
const EMPTY_NAME: &str = "col";

/// Is this word one of the reserved keywords (any case)?
pub fn is_reserved(word: &str) -> bool {
    let lowered = word.to_lowercase();
    RESERVED_WORDS.contains(&lowered.as_str())
}

/// Map a column name to a safe identifier.
///
/// Letters and digits of any script and `_` are kept; everything else
/// becomes `_`. A leading digit gets a `_` in front, and a result that is a
/// reserved keyword gets [`RESERVED_PREFIX`]. The function is total and
/// deterministic; it does not make distinct names unique, see [`NameMapping`].
pub fn sanitize(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if ident.is_empty() {
        return EMPTY_NAME.to_string();
    }

    if ident.chars().next().is_some_and(char::is_numeric) {
        ident.insert(0, '_');
    }

    if is_reserved(&ident) {
        ident.insert_str(0, RESERVED_PREFIX);
    }

    ident
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_examples() {
        assert_eq!(sanitize("환자 이름"), "환자_이름");
        assert_eq!(sanitize("price ($)"), "price____");
        assert_eq!(sanitize("2023 total"), "_2023_total");
        assert_eq!(sanitize("group"), "col_group");
        assert_eq!(sanitize("ORDER"), "col_ORDER");
        assert_eq!(sanitize("age"), "age");
        assert_eq!(sanitize("join_date"), "join_date");
        assert_eq!(sanitize(""), "col");
    }

    #[test]
    fn test_reserved_after_replacement() {
        // Punctuation is replaced first, so this stays a plain identifier
        assert_eq!(sanitize("group!"), "group_");
        assert_eq!(sanitize("by"), "col_by");
    }

    #[test]
    fn test_is_reserved_ignores_case() {
        assert!(is_reserved("Select"));
        assert!(is_reserved("NULL"));
        assert!(!is_reserved("selects"));
    }

    proptest! {
        #[test]
        fn sanitized_names_use_only_word_characters(name in "\\PC*") {
            let ident = sanitize(&name);
            prop_assert!(!ident.is_empty());
            prop_assert!(ident.chars().all(|c| c.is_alphanumeric() || c == '_'));
            prop_assert!(!ident.chars().next().unwrap().is_numeric());
            prop_assert!(!is_reserved(&ident));
        }

        #[test]
        fn sanitizing_twice_changes_nothing(name in "\\PC*") {
            let once = sanitize(&name);
            prop_assert_eq!(sanitize(&once), once);
        }
    }
}
