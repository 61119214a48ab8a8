// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use chrono::Utc;
use schema_guard::{
    schema::{SchemaSnapshot, TableDef, Tables},
    validate::{SchemaValidator, validate}
};

fn crm_schema() -> SchemaSnapshot {
    let mut tables = Tables::new();
    tables.insert("orders".into(), TableDef::with_columns(["id", "cust_id"]));
    tables.insert("customers".into(), TableDef::with_columns(["id", "name"]));
    SchemaSnapshot::new("crm", Some("postgres".into()), tables, Utc::now())
}

#[test]
fn test_validate_all_references_resolve() {
    let report = validate(
        &crm_schema(),
        "SELECT o.id FROM orders o JOIN customers c ON o.cust_id = c.id"
    );
    assert!(report.ok);
    assert!(report.unknown.is_empty());
}

#[test]
fn test_validate_unknown_column_uses_base_table() {
    let report = validate(
        &crm_schema(),
        "SELECT o.id FROM orders o JOIN customers c ON o.cust_id = c.unknown_col"
    );
    assert!(!report.ok);
    assert_eq!(report.unknown, vec!["customers.unknown_col"]);
}

#[test]
fn test_validate_unresolved_alias_is_unknown() {
    let report = validate(&crm_schema(), "SELECT x.id FROM orders o");
    assert!(!report.ok);
    assert_eq!(report.unknown, vec!["x.id"]);
}

#[test]
fn test_validate_bare_table_name_resolves() {
    let report = validate(&crm_schema(), "SELECT orders.id, customers.name FROM orders, customers");
    assert!(report.ok);
}

#[test]
fn test_validate_quoted_and_mixed_case() {
    let report = validate(&crm_schema(), r#"SELECT "C"."Name" FROM "Customers" "C""#);
    assert!(report.ok);
}

#[test]
fn test_validate_case_insensitive_schema_columns() {
    let mut tables = Tables::new();
    tables.insert("Users".into(), TableDef::with_columns(["\"Email\""]));
    let schema = SchemaSnapshot::new("s", None, tables, Utc::now());
    assert!(validate(&schema, "SELECT u.email FROM users u").ok);
}

#[test]
fn test_validate_records_every_unresolved_reference_in_discovery_order() {
    let report = validate(
        &crm_schema(),
        "SELECT o.total, c.email, o.total FROM orders o JOIN customers c ON c.id = o.cust_id"
    );
    assert_eq!(
        report.unknown,
        vec!["orders.total", "customers.email", "orders.total"]
    );
}

#[test]
fn test_validate_repeated_unknown_column_is_reported_per_occurrence() {
    let report = validate(&crm_schema(), "SELECT o.nope FROM orders o WHERE o.nope > 1");
    assert!(!report.ok);
    assert_eq!(report.unknown, vec!["orders.nope", "orders.nope"]);
}

#[test]
fn test_validate_schema_qualified_name_is_flagged() {
    let report = validate(&crm_schema(), "SELECT id FROM public.orders");
    assert_eq!(report.unknown, vec!["public.orders"]);
}

#[test]
fn test_validate_no_references() {
    let report = SchemaValidator::default().validate(&crm_schema(), "SELECT 1");
    assert!(report.ok);
}

#[test]
fn test_validate_against_empty_schema() {
    let schema = SchemaSnapshot::new("empty", None, Tables::new(), Utc::now());
    let report = validate(&schema, "SELECT t.a FROM t");
    assert_eq!(report.unknown, vec!["t.a"]);
}
