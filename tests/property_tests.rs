// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use chrono::Utc;
use proptest::prelude::*;
use schema_guard::{
    schema::{SchemaSnapshot, TableDef, Tables, diff, fingerprint},
    sql::{DEFAULT_DANGEROUS_KEYWORDS, classify}
};

fn table_entries() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    prop::collection::vec(
        (
            "[a-z][a-z0-9_]{0,8}",
            prop::collection::vec("[a-z][a-z0-9_]{0,8}", 0..6)
        ),
        0..8
    )
}

fn build(entries: &[(String, Vec<String>)]) -> Tables {
    entries
        .iter()
        .map(|(name, columns)| (name.clone(), TableDef::with_columns(columns.iter().cloned())))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn fingerprint_ignores_insertion_order(entries in table_entries()) {
        let forward = build(&entries);
        let mut reversed_entries = entries.clone();
        reversed_entries.reverse();
        // later duplicates win on insert, so keep the same winner
        let mut deduped: Vec<(String, Vec<String>)> = Vec::new();
        for (name, columns) in reversed_entries {
            if !deduped.iter().any(|(n, _)| *n == name) {
                deduped.push((name, columns));
            }
        }
        let backward = build(&deduped);
        prop_assert_eq!(fingerprint(&forward), fingerprint(&backward));
    }

    #[test]
    fn diff_with_itself_is_empty(entries in table_entries()) {
        let snapshot = SchemaSnapshot::new("p", None, build(&entries), Utc::now());
        prop_assert!(diff(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn keyword_prefix_of_identifier_never_matches(
        index in 0..DEFAULT_DANGEROUS_KEYWORDS.len(),
        suffix in "[a-z0-9_]{1,6}"
    ) {
        let ident = format!("{}{}", DEFAULT_DANGEROUS_KEYWORDS[index].to_lowercase(), suffix);
        let report = classify(&format!("SELECT {} FROM t", ident));
        prop_assert!(!report.blocked);
    }

    #[test]
    fn whole_word_keyword_always_matches(
        index in 0..DEFAULT_DANGEROUS_KEYWORDS.len(),
        prefix in "[ (;]{1,3}"
    ) {
        let keyword = DEFAULT_DANGEROUS_KEYWORDS[index];
        let report = classify(&format!("x{}{} y", prefix, keyword));
        prop_assert!(report.blocked);
        prop_assert!(report.matched_keywords.iter().any(|k| k == keyword));
    }
}
