//! Owner-scoped snapshot operations over a [`SnapshotStore`].
//!
//! Every operation takes the owner explicitly; nothing is shared between
//! owners. Updates follow the no-op policy: a new schema whose fingerprint
//! equals the stored one is not written and the stored timestamp is kept.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::{AppResult, snapshot_not_found},
    identity::OwnerId,
    schema::{SchemaDiff, SchemaSnapshot, SnapshotMeta, Tables, diff_tables},
    store::{SnapshotStore, check_path_segment}
};

/// Reason reported when an update is skipped
pub const NO_CHANGES: &str = "No changes detected.";
/// Reason reported when an update is written
pub const SCHEMA_UPDATED: &str = "Schema updated.";

/// Entry of [`SnapshotService::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotListItem {
    pub name:       String,
    pub updated_at: DateTime<Utc>,
    pub size:       Option<u64>
}

/// Result of [`SnapshotService::update`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub updated: bool,
    pub reason:  String,
    pub meta:    SnapshotMeta
}

/// Snapshot operations for any store
pub struct SnapshotService<S> {
    store: S
}

impl<S: SnapshotStore> SnapshotService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshots of `owner`, newest first.
    ///
    /// The timestamp comes from the document's `meta`, falling back to the
    /// store's modification time; unreadable documents are skipped.
    pub fn list(&self, owner: &OwnerId) -> AppResult<Vec<SnapshotListItem>> {
        let mut items = Vec::new();
        for object in self.store.list(owner)? {
            let Some(raw) = self.store.read(owner, &object.name)? else {
                continue;
            };
            match SchemaSnapshot::from_file_json(&raw) {
                Ok(snapshot) => items.push(SnapshotListItem {
                    name:       object.name,
                    updated_at: snapshot.updated_at(),
                    size:       Some(object.size)
                }),
                Err(e) => {
                    tracing::warn!(owner = %owner, name = %object.name, error = %e, "skipping unreadable snapshot");
                }
            }
        }
        items.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(items)
    }

    /// Create or replace `name` with a fresh timestamp and checksum
    pub fn save(
        &self,
        owner: &OwnerId,
        name: &str,
        dialect: Option<String>,
        tables: Tables
    ) -> AppResult<SnapshotMeta> {
        check_path_segment("snapshot name", name)?;
        let snapshot = SchemaSnapshot::new(name, dialect, tables, Utc::now());
        self.store
            .write(owner, name, &snapshot.to_file_json()?)?;
        tracing::info!(owner = %owner, name, checksum = snapshot.checksum(), "saved snapshot");
        Ok(snapshot.meta())
    }

    /// Stored document as written
    pub fn get_raw(&self, owner: &OwnerId, name: &str) -> AppResult<String> {
        check_path_segment("snapshot name", name)?;
        self.store
            .read(owner, name)?
            .ok_or_else(|| snapshot_not_found(name))
    }

    /// Stored snapshot, checksum recomputed from its tables
    pub fn get(&self, owner: &OwnerId, name: &str) -> AppResult<SchemaSnapshot> {
        SchemaSnapshot::from_file_json(&self.get_raw(owner, name)?)
    }

    /// Remove `name`, returning whether it existed
    pub fn delete(&self, owner: &OwnerId, name: &str) -> AppResult<bool> {
        check_path_segment("snapshot name", name)?;
        let removed = self.store.remove(owner, name)?;
        tracing::info!(owner = %owner, name, removed, "deleted snapshot");
        Ok(removed)
    }

    /// Differences from the stored snapshot to `new_tables`
    pub fn diff(&self, owner: &OwnerId, name: &str, new_tables: Tables) -> AppResult<SchemaDiff> {
        let stored = self.get(owner, name)?;
        let proposed = SchemaSnapshot::new(name, None, new_tables, Utc::now());
        Ok(diff_tables(stored.tables(), proposed.tables()))
    }

    /// Replace the tables of `name` unless nothing changed.
    ///
    /// The dialect is kept. When the new fingerprint equals the stored one
    /// nothing is written and the returned meta is the stored one.
    pub fn update(
        &self,
        owner: &OwnerId,
        name: &str,
        new_tables: Tables
    ) -> AppResult<UpdateOutcome> {
        let mut snapshot = self.get(owner, name)?;
        if !snapshot.update(new_tables, Utc::now()) {
            tracing::info!(owner = %owner, name, "update skipped, schema unchanged");
            return Ok(UpdateOutcome {
                updated: false,
                reason:  NO_CHANGES.to_string(),
                meta:    snapshot.meta()
            });
        }
        self.store
            .write(owner, name, &snapshot.to_file_json()?)?;
        tracing::info!(owner = %owner, name, checksum = snapshot.checksum(), "updated snapshot");
        Ok(UpdateOutcome {
            updated: true,
            reason:  SCHEMA_UPDATED.to_string(),
            meta:    snapshot.meta()
        })
    }
}
