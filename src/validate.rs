//! Schema-aware validation of dotted references.
//!
//! Every `table-or-alias.column` pair found by the extractor must resolve to a
//! declared column, otherwise it is reported as unknown. Resolution goes
//! through the alias map first and falls back to treating the qualifier as a
//! table name. A qualifier that names no table is reported as written.

use serde::Serialize;

use crate::{
    schema::SchemaSnapshot,
    sql::{Reference, ReferenceExtractor}
};

/// Outcome of validating one statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub ok:      bool,
    /// `table.column` strings, one per unresolved reference, in discovery order
    pub unknown: Vec<String>
}

/// Validator owning the extractor used to find references
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    extractor: ReferenceExtractor
}

impl SchemaValidator {
    pub fn new(extractor: ReferenceExtractor) -> Self {
        Self {
            extractor
        }
    }

    /// Check every dotted reference in `sql` against `schema`.
    ///
    /// ```
    /// use chrono::Utc;
    /// use schema_guard::{
    ///     schema::{SchemaSnapshot, TableDef, Tables},
    ///     validate::SchemaValidator
    /// };
    ///
    /// let mut tables = Tables::new();
    /// tables.insert("orders".into(), TableDef::with_columns(["id", "cust_id"]));
    /// tables.insert("customers".into(), TableDef::with_columns(["id", "name"]));
    /// let schema = SchemaSnapshot::new("shop", None, tables, Utc::now());
    ///
    /// let validator = SchemaValidator::default();
    /// let report = validator.validate(
    ///     &schema,
    ///     "SELECT o.id FROM orders o JOIN customers c ON o.cust_id = c.unknown_col"
    /// );
    /// assert!(!report.ok);
    /// assert_eq!(report.unknown, ["customers.unknown_col"]);
    /// ```
    pub fn validate(&self, schema: &SchemaSnapshot, sql: &str) -> ValidationReport {
        let extraction = self.extractor.extract(sql);
        let mut unknown = Vec::new();
        for reference in &extraction.references {
            let qualifier = reference.table_or_alias.as_str();
            let base = extraction
                .alias_map
                .get(qualifier)
                .map(String::as_str)
                .unwrap_or(qualifier);
            if let Some(entry) = unresolved(schema, base, reference) {
                unknown.push(entry);
            }
        }
        tracing::debug!(
            references = extraction.references.len(),
            unknown = unknown.len(),
            "validated references"
        );
        ValidationReport {
            ok:      unknown.is_empty(),
            unknown
        }
    }
}

/// `None` when the reference resolves, else the entry to report
fn unresolved(schema: &SchemaSnapshot, base: &str, reference: &Reference) -> Option<String> {
    match schema.table(base) {
        None => Some(format!(
            "{}.{}",
            reference.table_or_alias, reference.column
        )),
        Some(table) if !table.has_column(&reference.column) => {
            Some(format!("{}.{}", base, reference.column))
        }
        Some(_) => None
    }
}

/// Validate with the default extractor
pub fn validate(schema: &SchemaSnapshot, sql: &str) -> ValidationReport {
    SchemaValidator::default().validate(schema, sql)
}
