//! Structural diff between two schema snapshots.
//!
//! Tables are compared by key, columns by normalized name. Type and
//! nullability changes are not reported.

use indexmap::IndexSet;
use serde::Serialize;

use super::types::{SchemaSnapshot, TableDef, Tables};

/// Column-level change for a table present in both snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableChange {
    pub table:           String,
    pub added_columns:   Vec<String>,
    pub removed_columns: Vec<String>
}

/// Added, removed and changed tables from old to new
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    pub added:   Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<TableChange>
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Diff two snapshots
pub fn diff(old: &SchemaSnapshot, new: &SchemaSnapshot) -> SchemaDiff {
    diff_tables(old.tables(), new.tables())
}

/// Diff two table mappings.
///
/// `added` and `changed` follow the new mapping's order, `removed` the old
/// one's.
///
/// ```
/// use schema_guard::schema::{TableDef, Tables, diff_tables};
///
/// let old: Tables = [
///     ("a".to_string(), TableDef::with_columns(["x"])),
///     ("b".to_string(), TableDef::with_columns(["x", "y"])),
/// ]
/// .into_iter()
/// .collect();
/// let new: Tables = [
///     ("b".to_string(), TableDef::with_columns(["x"])),
///     ("c".to_string(), TableDef::with_columns(["z"])),
/// ]
/// .into_iter()
/// .collect();
///
/// let d = diff_tables(&old, &new);
/// assert_eq!(d.added, ["c"]);
/// assert_eq!(d.removed, ["a"]);
/// assert_eq!(d.changed[0].table, "b");
/// assert_eq!(d.changed[0].removed_columns, ["y"]);
/// assert!(d.changed[0].added_columns.is_empty());
/// ```
pub fn diff_tables(old: &Tables, new: &Tables) -> SchemaDiff {
    let mut result = SchemaDiff::default();
    for (name, new_table) in new {
        match old.get(name) {
            None => result.added.push(name.clone()),
            Some(old_table) => {
                if let Some(change) = diff_columns(name, old_table, new_table) {
                    result.changed.push(change);
                }
            }
        }
    }
    result.removed = old
        .keys()
        .filter(|name| !new.contains_key(*name))
        .cloned()
        .collect();
    tracing::debug!(
        added = result.added.len(),
        removed = result.removed.len(),
        changed = result.changed.len(),
        "computed schema diff"
    );
    result
}

fn diff_columns(table: &str, old: &TableDef, new: &TableDef) -> Option<TableChange> {
    let old_names: IndexSet<String> = old.columns.iter().map(|c| c.normalized_name()).collect();
    let new_names: IndexSet<String> = new.columns.iter().map(|c| c.normalized_name()).collect();
    let added_columns: Vec<String> = new
        .columns
        .iter()
        .filter(|c| !old_names.contains(&c.normalized_name()))
        .map(|c| c.name.clone())
        .collect();
    let removed_columns: Vec<String> = old
        .columns
        .iter()
        .filter(|c| !new_names.contains(&c.normalized_name()))
        .map(|c| c.name.clone())
        .collect();
    if added_columns.is_empty() && removed_columns.is_empty() {
        return None;
    }
    Some(TableChange {
        table: table.to_string(),
        added_columns,
        removed_columns
    })
}
