// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use chrono::Utc;
use schema_guard::{
    llm::strip_fences,
    prompt::{build_system_prompt, build_user_prompt},
    schema::{SchemaSnapshot, TableDef, Tables}
};

#[test]
fn test_system_prompt_rules() {
    let prompt = build_system_prompt("postgres");
    assert!(prompt.contains("POSTGRES"));
    assert!(prompt.contains("exactly one"));
    assert!(prompt.contains("no markdown fences"));
    assert!(prompt.contains("provided schema"));
}

#[test]
fn test_user_prompt_embeds_schema_and_request() {
    let mut tables = Tables::new();
    tables.insert("users".into(), TableDef::with_columns(["id", "email"]));
    let schema = SchemaSnapshot::new("crm", Some("postgres".into()), tables, Utc::now());
    let prompt = build_user_prompt("  count users  ", &schema.to_summary(), "postgres");
    assert!(prompt.contains("Table: users"));
    assert!(prompt.contains("  - email"));
    assert!(prompt.ends_with("\"count users\""));
}

#[test]
fn test_strip_fences() {
    assert_eq!(strip_fences("```sql\nSELECT * FROM users\n```"), "SELECT * FROM users");
    assert_eq!(strip_fences("```SQL\nSELECT 1;\n```"), "SELECT 1;");
    assert_eq!(strip_fences("SELECT 1"), "SELECT 1");
    assert_eq!(strip_fences("```sql\n\n```"), "");
}
