//! Snapshot persistence.
//!
//! Snapshots are opaque JSON documents keyed by `<owner>/<name>.json`. The
//! [`SnapshotStore`] trait is the storage seam; [`FsSnapshotStore`] keeps them
//! on the local filesystem.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf}
};

use chrono::{DateTime, Utc};
use tempfile::Builder;

use crate::{
    error::{AppResult, file_read_error, file_write_error, input_error},
    identity::OwnerId
};

const EXTENSION: &str = "json";

/// Listing entry for a stored snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub name:       String,
    pub updated_at: DateTime<Utc>,
    pub size:       u64
}

/// Per-owner document storage
pub trait SnapshotStore: Send + Sync {
    /// All documents of `owner`, in no particular order
    fn list(&self, owner: &OwnerId) -> AppResult<Vec<StoredObject>>;

    /// Raw document, `None` when absent
    fn read(&self, owner: &OwnerId, name: &str) -> AppResult<Option<String>>;

    /// Create or replace a document
    fn write(&self, owner: &OwnerId, name: &str, contents: &str) -> AppResult<()>;

    /// Remove a document, returning whether it existed
    fn remove(&self, owner: &OwnerId, name: &str) -> AppResult<bool>;
}

/// Reject names that would escape or alias their directory
///
/// # Errors
///
/// Returns an input error naming `what`
pub fn check_path_segment(what: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(input_error(format!("The {} must not be empty", what)));
    }
    if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(input_error(format!("Invalid {}: '{}'", what, value)));
    }
    Ok(())
}

/// Filesystem store rooted at a directory
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into()
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner: &OwnerId) -> PathBuf {
        self.root.join(owner.as_str())
    }

    fn document_path(&self, owner: &OwnerId, name: &str) -> AppResult<PathBuf> {
        check_path_segment("snapshot name", name)?;
        Ok(self
            .owner_dir(owner)
            .join(format!("{}.{}", name, EXTENSION)))
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn list(&self, owner: &OwnerId) -> AppResult<Vec<StoredObject>> {
        let dir = self.owner_dir(owner);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(file_read_error(&dir.display().to_string(), e))
        };
        let mut objects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| file_read_error(&dir.display().to_string(), e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let metadata = entry
                .metadata()
                .map_err(|e| file_read_error(&path.display().to_string(), e))?;
            if !metadata.is_file() {
                continue;
            }
            let updated_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default();
            objects.push(StoredObject {
                name: name.to_string(),
                updated_at,
                size: metadata.len()
            });
        }
        tracing::debug!(owner = %owner, count = objects.len(), "listed snapshots");
        Ok(objects)
    }

    fn read(&self, owner: &OwnerId, name: &str) -> AppResult<Option<String>> {
        let path = self.document_path(owner, name)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(file_read_error(&path.display().to_string(), e))
        }
    }

    fn write(&self, owner: &OwnerId, name: &str, contents: &str) -> AppResult<()> {
        let path = self.document_path(owner, name)?;
        let dir = self.owner_dir(owner);
        fs::create_dir_all(&dir).map_err(|e| file_write_error(&dir.display().to_string(), e))?;
        // unique temp file per call, renamed over the target so readers never
        // see a partial document
        let mut tmp = Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| file_write_error(&dir.display().to_string(), e))?;
        tmp.write_all(contents.as_bytes())
            .map_err(|e| file_write_error(&tmp.path().display().to_string(), e))?;
        tmp.persist(&path)
            .map_err(|e| file_write_error(&path.display().to_string(), e.error))?;
        tracing::debug!(owner = %owner, name, bytes = contents.len(), "wrote snapshot");
        Ok(())
    }

    fn remove(&self, owner: &OwnerId, name: &str) -> AppResult<bool> {
        let path = self.document_path(owner, name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(owner = %owner, name, "removed snapshot");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(file_write_error(&path.display().to_string(), e))
        }
    }
}
