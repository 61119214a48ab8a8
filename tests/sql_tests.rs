// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use schema_guard::sql::{
    DEFAULT_DANGEROUS_KEYWORDS, DangerClassifier, DangerPolicy, ExtractorConfig, Reference,
    ReferenceExtractor, classify, extract_references, normalize_identifier, split_statements
};

#[test]
fn test_classify_select_is_clean() {
    let report = classify("SELECT id, name FROM users WHERE id = 1");
    assert!(!report.blocked);
    assert!(report.matched_keywords.is_empty());
    assert!(report.reason.is_none());
}

#[test]
fn test_classify_every_default_keyword() {
    for keyword in DEFAULT_DANGEROUS_KEYWORDS {
        let report = classify(&format!("{} something", keyword.to_lowercase()));
        assert!(report.blocked, "{} not detected", keyword);
        assert_eq!(report.matched_keywords.as_slice(), [keyword]);
    }
}

#[test]
fn test_classify_word_boundary() {
    assert!(!classify("SELECT * FROM t WHERE UPDATED_AT = 1").blocked);
    assert!(!classify("SELECT dropped, created_by, inserts FROM audit").blocked);
    assert!(!classify("SELECT * FROM t_delete").blocked);
}

#[test]
fn test_classify_reports_policy_order() {
    let report = classify("INSERT INTO a SELECT * FROM b; DROP TABLE b; insert into c values (1)");
    assert_eq!(report.matched_keywords.as_slice(), ["DROP", "INSERT"]);
    let reason = report.reason.unwrap();
    assert!(reason.contains("DROP, INSERT"));
}

#[test]
fn test_classify_is_syntax_blind() {
    let report = classify("SELECT 'please do not DROP this' AS note");
    assert!(report.blocked);
    assert_eq!(report.matched_keywords.as_slice(), ["DROP"]);
    assert!(classify("SELECT 1 -- delete later").blocked);
}

#[test]
fn test_custom_policy() {
    let policy = DangerPolicy::new(["vacuum", "copy"]).unwrap();
    let classifier = DangerClassifier::new(policy).unwrap();
    assert!(!classifier.classify("DROP TABLE t").blocked);
    let report = classifier.classify("COPY t TO '/tmp/x'; VACUUM");
    assert_eq!(report.matched_keywords.as_slice(), ["VACUUM", "COPY"]);
}

#[test]
fn test_extract_join_example() {
    let extraction =
        extract_references("SELECT o.id FROM orders o JOIN customers c ON o.cust_id = c.id");
    let aliases: Vec<(&str, &str)> = extraction
        .alias_map
        .iter()
        .map(|(a, t)| (a.as_str(), t.as_str()))
        .collect();
    assert_eq!(aliases, vec![("o", "orders"), ("c", "customers")]);
    assert_eq!(
        extraction.references,
        vec![
            Reference::new("o", "id"),
            Reference::new("o", "cust_id"),
            Reference::new("c", "id")
        ]
    );
}

#[test]
fn test_extract_explicit_as_is_case_insensitive() {
    let extraction = extract_references("select u.name from Users as U");
    assert_eq!(extraction.alias_map["u"], "users");
}

#[test]
fn test_extract_clause_keyword_is_not_an_alias() {
    let extraction = extract_references("SELECT orders.id FROM orders WHERE orders.id = 1");
    assert!(extraction.alias_map.is_empty());
    let extraction = extract_references("SELECT o.id FROM orders o LEFT JOIN items ON items.order_id = o.id");
    assert_eq!(extraction.alias_map.len(), 1);
    assert_eq!(extraction.alias_map["o"], "orders");
}

#[test]
fn test_extract_whitespace_around_dot() {
    let extraction = extract_references("SELECT o . id FROM orders o");
    assert_eq!(extraction.references, vec![Reference::new("o", "id")]);
}

#[test]
fn test_extract_ignores_string_literals() {
    let extraction = extract_references("SELECT 'a.b' AS x, o.id FROM orders o");
    assert_eq!(extraction.references, vec![Reference::new("o", "id")]);
}

#[test]
fn test_extract_empty_results() {
    let extraction = extract_references("SELECT 1");
    assert!(extraction.alias_map.is_empty());
    assert!(extraction.references.is_empty());
}

#[test]
fn test_extractor_with_custom_clause_keywords() {
    let mut config = ExtractorConfig::default();
    config.clause_keywords.insert(String::from("SAMPLE"));
    let extractor = ReferenceExtractor::new(config);
    let extraction = extractor.extract("SELECT t.id FROM events SAMPLE 10");
    assert!(extraction.alias_map.is_empty());
}

#[test]
fn test_normalize_identifier() {
    assert_eq!(normalize_identifier("\"UserId\""), "userid");
    assert_eq!(normalize_identifier("  name "), "name");
}

#[test]
fn test_split_statements_respects_quotes_and_comments() {
    let script = "SELECT ';' FROM t; -- a; b\nSELECT \"x;y\" FROM u;\n\n";
    let parts = split_statements(script);
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], "SELECT ';' FROM t");
    assert!(parts[1].ends_with("SELECT \"x;y\" FROM u"));
}

#[test]
fn test_split_statements_empty_script() {
    assert!(split_statements(" ; ;\n").is_empty());
}
