// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use chrono::Utc;
use schema_guard::{
    guard::{DangerAction, Guard, Verdict, overall_verdict, wrap_with_savepoint},
    schema::{SchemaSnapshot, TableDef, Tables}
};

fn schema() -> SchemaSnapshot {
    let mut tables = Tables::new();
    tables.insert("orders".into(), TableDef::with_columns(["id", "cust_id"]));
    tables.insert("customers".into(), TableDef::with_columns(["id", "name"]));
    SchemaSnapshot::new("crm", None, tables, Utc::now())
}

#[test]
fn test_block_is_default() {
    let decision = Guard::default()
        .check("DELETE FROM orders", Some(&schema()))
        .unwrap();
    assert_eq!(decision.verdict, Verdict::Blocked);
    assert!(decision.validation.is_none());
    assert_eq!(decision.danger.matched_keywords.as_slice(), ["DELETE"]);
    assert_eq!(decision.sql, "DELETE FROM orders");
}

#[test]
fn test_warn_action_annotates() {
    let guard = Guard::default().with_action(DangerAction::Warn);
    let decision = guard
        .check("DELETE FROM orders o WHERE o.id = 1", Some(&schema()))
        .unwrap();
    assert_eq!(decision.verdict, Verdict::Warn);
    assert_eq!(decision.warnings.len(), 1);
    assert!(decision.validation.unwrap().ok);
    assert_eq!(decision.sql, "DELETE FROM orders o WHERE o.id = 1");
}

#[test]
fn test_wrap_action_wraps_in_savepoint() {
    let guard = Guard::default()
        .with_action(DangerAction::Wrap)
        .with_savepoint_name("probe");
    let decision = guard.check("UPDATE orders SET cust_id = 2", None).unwrap();
    assert_eq!(decision.verdict, Verdict::Warn);
    assert_eq!(
        decision.sql,
        "BEGIN;\nSAVEPOINT probe;\nUPDATE orders SET cust_id = 2;\nROLLBACK TO SAVEPOINT probe;\nCOMMIT;"
    );
}

#[test]
fn test_safe_select_is_allowed() {
    let decision = Guard::default()
        .check(
            "SELECT o.id, c.name FROM orders o JOIN customers c ON o.cust_id = c.id",
            Some(&schema())
        )
        .unwrap();
    assert_eq!(decision.verdict, Verdict::Allowed);
    assert!(decision.warnings.is_empty());
}

#[test]
fn test_unknown_references_rejected_by_default() {
    let decision = Guard::default()
        .check("SELECT o.total FROM orders o", Some(&schema()))
        .unwrap();
    assert_eq!(decision.verdict, Verdict::Blocked);
    assert!(decision.warnings[0].contains("orders.total"));
}

#[test]
fn test_unknown_references_can_be_allowed() {
    let decision = Guard::default()
        .with_reject_unknown(false)
        .check("SELECT o.total FROM orders o", Some(&schema()))
        .unwrap();
    assert_eq!(decision.verdict, Verdict::Warn);
    assert_eq!(decision.validation.unwrap().unknown, vec!["orders.total"]);
}

#[test]
fn test_without_schema_skips_validation() {
    let decision = Guard::default().check("SELECT x.y FROM t x", None).unwrap();
    assert_eq!(decision.verdict, Verdict::Allowed);
    assert!(decision.validation.is_none());
}

#[test]
fn test_empty_sql_is_an_error() {
    assert!(Guard::default().check("", None).is_err());
    assert!(Guard::default().check(" \n\t", None).is_err());
    assert!(Guard::default().check_batch(";;", None).is_err());
}

#[test]
fn test_batch_keeps_script_order() {
    let script = "SELECT o.id FROM orders o; DROP TABLE orders; SELECT c.age FROM customers c";
    let decisions = Guard::default()
        .check_batch(script, Some(&schema()))
        .unwrap();
    let verdicts: Vec<Verdict> = decisions.iter().map(|d| d.verdict).collect();
    assert_eq!(verdicts, vec![Verdict::Allowed, Verdict::Blocked, Verdict::Blocked]);
    assert_eq!(decisions[1].sql, "DROP TABLE orders");
    assert_eq!(overall_verdict(&decisions), Verdict::Blocked);
}

#[test]
fn test_overall_verdict() {
    assert_eq!(overall_verdict(&[]), Verdict::Allowed);
    let guard = Guard::default().with_action(DangerAction::Warn);
    let decisions = guard.check_batch("SELECT 1; TRUNCATE t", None).unwrap();
    assert_eq!(overall_verdict(&decisions), Verdict::Warn);
}

#[test]
fn test_verdict_exit_codes() {
    assert_eq!(Verdict::Allowed.exit_code(), 0);
    assert_eq!(Verdict::Warn.exit_code(), 1);
    assert_eq!(Verdict::Blocked.exit_code(), 2);
}

#[test]
fn test_wrap_keeps_existing_terminator() {
    let wrapped = wrap_with_savepoint("  DELETE FROM t;  ", "g");
    assert!(wrapped.contains("\nDELETE FROM t;\n"));
    assert!(!wrapped.contains(";;"));
}

#[test]
fn test_decision_serializes_lowercase_verdict() {
    let decision = Guard::default().check("DROP TABLE t", None).unwrap();
    let json = serde_json::to_value(&decision).unwrap();
    assert_eq!(json["verdict"], "blocked");
    assert_eq!(json["danger"]["blocked"], true);
    assert!(json.get("validation").is_none());
}
