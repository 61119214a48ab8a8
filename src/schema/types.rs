//! Schema snapshot data model.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::fingerprint::fingerprint;
use crate::sql::normalize_identifier;

/// Lower-cased table name to table definition, in insertion order.
///
/// Iteration follows the source payload; [`fingerprint`] sorts on its own.
pub type Tables = IndexMap<String, TableDef>;

/// Column metadata; only the name matters for validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ColumnRepr")]
pub struct ColumnDef {
    pub name:      String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable:  Option<bool>
}

impl ColumnDef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name:      name.into(),
            data_type: None,
            nullable:  None
        }
    }

    pub fn typed(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name:      name.into(),
            data_type: Some(data_type.into()),
            nullable:  Some(nullable)
        }
    }

    /// Quote-stripped, lower-cased name
    pub fn normalized_name(&self) -> String {
        normalize_identifier(&self.name)
    }
}

/// Columns may be written as plain strings or as objects
#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnRepr {
    Name(String),
    Full {
        name:      String,
        #[serde(rename = "type", default)]
        data_type: Option<String>,
        #[serde(default)]
        nullable:  Option<bool>
    }
}

impl From<ColumnRepr> for ColumnDef {
    fn from(repr: ColumnRepr) -> Self {
        match repr {
            ColumnRepr::Name(name) => Self::named(name),
            ColumnRepr::Full {
                name,
                data_type,
                nullable
            } => Self {
                name,
                data_type,
                nullable
            }
        }
    }
}

/// Foreign key as reported by catalog introspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column:     String,
    pub ref_table:  String,
    pub ref_column: String
}

/// Table definition with columns in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDef {
    #[serde(default)]
    pub columns:      Vec<ColumnDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key:  Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>
}

impl TableDef {
    /// Table with untyped columns
    pub fn with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        Self {
            columns: names.into_iter().map(ColumnDef::named).collect(),
            ..Self::default()
        }
    }

    /// Whether a column matches the already normalized `column`
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.normalized_name() == column)
    }
}

/// Snapshot metadata as persisted in the `meta` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub name:       String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialect:    Option<String>,
    #[serde(alias = "updated_at")]
    pub updated_at: DateTime<Utc>,
    pub checksum:   String
}

/// Named, versioned capture of a schema's table/column structure.
///
/// The checksum always equals [`fingerprint`] of the current tables: fields
/// are private and every mutation goes through [`SchemaSnapshot::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSnapshot {
    name:       String,
    dialect:    Option<String>,
    tables:     Tables,
    checksum:   String,
    updated_at: DateTime<Utc>
}

impl SchemaSnapshot {
    pub fn new(
        name: impl Into<String>,
        dialect: Option<String>,
        tables: Tables,
        now: DateTime<Utc>
    ) -> Self {
        let tables = super::normalize_tables(tables);
        let checksum = fingerprint(&tables);
        Self {
            name: name.into(),
            dialect,
            tables,
            checksum,
            updated_at: now
        }
    }

    /// Rebuild a snapshot from persisted metadata and tables.
    ///
    /// The checksum is recomputed; a stale stored value is replaced.
    pub fn restore(meta: SnapshotMeta, tables: Tables) -> Self {
        let snapshot = Self::new(meta.name, meta.dialect, tables, meta.updated_at);
        if snapshot.checksum != meta.checksum {
            tracing::warn!(
                snapshot = %snapshot.name,
                stored = %meta.checksum,
                computed = %snapshot.checksum,
                "stored checksum does not match schema content, using recomputed value"
            );
        }
        snapshot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> Option<&str> {
        self.dialect.as_deref()
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            name:       self.name.clone(),
            dialect:    self.dialect.clone(),
            updated_at: self.updated_at,
            checksum:   self.checksum.clone()
        }
    }

    /// Replace the tables unless the content fingerprint is unchanged.
    ///
    /// Returns `false` (and leaves checksum and timestamp untouched) for a
    /// semantically identical re-save.
    pub fn update(&mut self, tables: Tables, now: DateTime<Utc>) -> bool {
        let tables = super::normalize_tables(tables);
        let checksum = fingerprint(&tables);
        if checksum == self.checksum {
            return false;
        }
        self.tables = tables;
        self.checksum = checksum;
        self.updated_at = now;
        true
    }
}
