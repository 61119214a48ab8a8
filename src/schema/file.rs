//! Persisted snapshot files and schema payload loading.
//!
//! Snapshot file layout:
//!
//! ```json
//! {
//!   "meta":   { "name": "crm", "dialect": "postgres", "updatedAt": "...", "checksum": "1a2b3c4d" },
//!   "schema": { "tables": { "orders": { "columns": [ { "name": "id", "type": "integer" } ] } } }
//! }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    ddl::{SqlDialect, parse_ddl},
    normalize_tables,
    types::{SchemaSnapshot, SnapshotMeta, Tables}
};
use crate::error::{AppResult, input_error, serialization_error};

/// `schema` object of a snapshot file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaBody {
    #[serde(default)]
    pub tables: Tables
}

/// On-disk snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub meta:   SnapshotMeta,
    pub schema: SchemaBody
}

impl SchemaSnapshot {
    /// Render as a pretty-printed snapshot file
    pub fn to_file_json(&self) -> AppResult<String> {
        let file = SnapshotFile {
            meta:   self.meta(),
            schema: SchemaBody {
                tables: self.tables().clone()
            }
        };
        serde_json::to_string_pretty(&file).map_err(serialization_error)
    }

    /// Parse a snapshot file
    ///
    /// # Errors
    ///
    /// Returns an input error if the document is not a snapshot file
    pub fn from_file_json(text: &str) -> AppResult<Self> {
        let file: SnapshotFile = serde_json::from_str(text)
            .map_err(|e| input_error(format!("Invalid snapshot file: {}", e)))?;
        Ok(Self::restore(file.meta, file.schema.tables))
    }
}

/// Load tables from a schema payload.
///
/// Accepted shapes: a snapshot file, an object with a `tables` mapping (for
/// example introspection output), or SQL DDL.
///
/// # Errors
///
/// Returns an input error for empty input or JSON that is not an object with
/// a `tables` mapping, and a schema parse error for invalid DDL
pub fn load_tables(text: &str, dialect: SqlDialect) -> AppResult<Tables> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(input_error("Schema payload is empty"));
    }
    if !looks_like_json(trimmed) {
        return parse_ddl(trimmed, dialect);
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| input_error(format!("Invalid schema JSON: {}", e)))?;
    tables_from_value(value)
}

/// Extract tables from a parsed JSON payload
pub fn tables_from_value(value: Value) -> AppResult<Tables> {
    let tables = match value {
        Value::Object(mut map) => match map.remove("schema") {
            Some(Value::Object(mut schema)) if schema.contains_key("tables") => {
                schema.remove("tables")
            }
            _ => map.remove("tables")
        },
        _ => None
    };
    let Some(tables @ Value::Object(_)) = tables else {
        return Err(input_error(
            "Schema payload must be an object with a 'tables' mapping"
        ));
    };
    let raw: Tables = serde_json::from_value(tables)
        .map_err(|e| input_error(format!("Invalid table definitions: {}", e)))?;
    Ok(normalize_tables(raw))
}

/// Load a snapshot from a payload, naming ad hoc schemas `fallback_name`
pub fn load_snapshot(
    text: &str,
    fallback_name: &str,
    dialect: Option<&str>
) -> AppResult<SchemaSnapshot> {
    let trimmed = text.trim();
    if looks_like_json(trimmed)
        && let Ok(file) = serde_json::from_str::<SnapshotFile>(trimmed)
    {
        return Ok(SchemaSnapshot::restore(file.meta, file.schema.tables));
    }
    let parse_dialect = dialect.map(SqlDialect::from_name).unwrap_or_default();
    let tables = load_tables(trimmed, parse_dialect)?;
    Ok(SchemaSnapshot::new(
        fallback_name,
        dialect.map(str::to_string),
        tables,
        Utc::now()
    ))
}

fn looks_like_json(text: &str) -> bool {
    text.starts_with(['{', '[', '"'])
}
