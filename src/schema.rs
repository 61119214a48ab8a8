//! Schema snapshots: data model, fingerprints, diffs and import.
//!
//! A [`SchemaSnapshot`] is a named capture of a database's tables and
//! columns. It can be built from catalog introspection output, a persisted
//! snapshot file or SQL DDL, and it is what the validator checks references
//! against.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use schema_guard::schema::{SchemaSnapshot, TableDef, Tables, diff};
//!
//! let mut tables = Tables::new();
//! tables.insert("Users".into(), TableDef::with_columns(["id", "email"]));
//! let old = SchemaSnapshot::new("crm", Some("postgres".into()), tables.clone(), Utc::now());
//!
//! // keys are lower-cased
//! assert!(old.table("users").is_some());
//!
//! tables.insert("orders".into(), TableDef::with_columns(["id"]));
//! let new = SchemaSnapshot::new("crm", Some("postgres".into()), tables, Utc::now());
//! assert_ne!(old.checksum(), new.checksum());
//! assert_eq!(diff(&old, &new).added, ["orders"]);
//! ```

mod ddl;
mod diff;
mod file;
mod fingerprint;
mod types;

use std::collections::HashSet;

pub use ddl::{SqlDialect, parse_ddl};
pub use diff::{SchemaDiff, TableChange, diff, diff_tables};
pub use file::{SchemaBody, SnapshotFile, load_snapshot, load_tables, tables_from_value};
pub use fingerprint::{canonical_json, checksum, fingerprint};
pub use types::{ColumnDef, ForeignKey, SchemaSnapshot, SnapshotMeta, TableDef, Tables};

use crate::sql::normalize_identifier;

/// Lower-case table keys and drop columns whose normalized name repeats.
///
/// On a key collision the later table wins.
pub fn normalize_tables(raw: Tables) -> Tables {
    let mut tables = Tables::new();
    for (name, mut table) in raw {
        let key = normalize_identifier(&name);
        let mut seen = HashSet::new();
        table.columns.retain(|c| {
            let fresh = seen.insert(c.normalized_name());
            if !fresh {
                tracing::warn!(table = %key, column = %c.name, "dropping duplicate column");
            }
            fresh
        });
        if tables.insert(key.clone(), table).is_some() {
            tracing::warn!(table = %key, "table names collide after lower-casing");
        }
    }
    tables
}

impl SchemaSnapshot {
    /// Render the schema as plain text for the language model
    pub fn to_summary(&self) -> String {
        let mut summary = match self.dialect() {
            Some(dialect) => format!("Database Schema ({}):\n\n", dialect),
            None => String::from("Database Schema:\n\n")
        };
        if self.tables().is_empty() {
            summary.push_str("(no tables)\n");
            return summary;
        }
        for (name, table) in self.tables() {
            summary.push_str(&format!("Table: {}\n", name));
            summary.push_str("Columns:\n");
            for col in &table.columns {
                let data_type = col
                    .data_type
                    .as_ref()
                    .map(|t| format!(" {}", t))
                    .unwrap_or_default();
                let nullable = match col.nullable {
                    Some(true) => " NULL",
                    Some(false) => " NOT NULL",
                    None => ""
                };
                summary.push_str(&format!(
                    "  - {name}{data_type}{nullable}\n",
                    name = col.name,
                    data_type = data_type,
                    nullable = nullable
                ));
            }
            if !table.primary_key.is_empty() {
                summary.push_str(&format!(
                    "Primary Key: ({})\n",
                    table.primary_key.join(", ")
                ));
            }
            if !table.foreign_keys.is_empty() {
                summary.push_str("Foreign Keys:\n");
                for fk in &table.foreign_keys {
                    summary.push_str(&format!(
                        "  - {} -> {}.{}\n",
                        fk.column, fk.ref_table, fk.ref_column
                    ));
                }
            }
            summary.push('\n');
        }
        summary
    }
}
