// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::fs;

use schema_guard::{
    identity::OwnerId,
    schema::{TableDef, Tables},
    snapshots::{NO_CHANGES, SCHEMA_UPDATED, SnapshotService},
    store::{FsSnapshotStore, SnapshotStore}
};
use tempfile::TempDir;

fn service() -> (TempDir, SnapshotService<FsSnapshotStore>) {
    let dir = TempDir::new().unwrap();
    let service = SnapshotService::new(FsSnapshotStore::new(dir.path()));
    (dir, service)
}

fn owner(id: &str) -> OwnerId {
    OwnerId::new(id).unwrap()
}

fn crm_tables() -> Tables {
    let mut tables = Tables::new();
    tables.insert("orders".into(), TableDef::with_columns(["id", "cust_id"]));
    tables.insert("customers".into(), TableDef::with_columns(["id", "name"]));
    tables
}

#[test]
fn test_save_writes_owner_scoped_file() {
    let (dir, service) = service();
    let meta = service
        .save(&owner("alice"), "crm", Some("postgres".into()), crm_tables())
        .unwrap();
    assert_eq!(meta.name, "crm");
    assert_eq!(meta.checksum.len(), 8);
    assert!(dir.path().join("alice").join("crm.json").is_file());
}

#[test]
fn test_get_returns_saved_snapshot() {
    let (_dir, service) = service();
    let alice = owner("alice");
    let meta = service
        .save(&alice, "crm", Some("postgres".into()), crm_tables())
        .unwrap();
    let snapshot = service.get(&alice, "crm").unwrap();
    assert_eq!(snapshot.checksum(), meta.checksum);
    assert_eq!(snapshot.dialect(), Some("postgres"));
    assert!(snapshot.table("customers").unwrap().has_column("name"));

    let raw = service.get_raw(&alice, "crm").unwrap();
    assert!(raw.contains("\"updatedAt\""));
}

#[test]
fn test_owners_are_isolated() {
    let (_dir, service) = service();
    service
        .save(&owner("alice"), "crm", None, crm_tables())
        .unwrap();
    assert!(service.get(&owner("bob"), "crm").is_err());
    assert!(service.list(&owner("bob")).unwrap().is_empty());
    assert!(!service.delete(&owner("bob"), "crm").unwrap());
}

#[test]
fn test_list_sorted_newest_first() {
    let (_dir, service) = service();
    let alice = owner("alice");
    service.save(&alice, "first", None, crm_tables()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(10));
    service.save(&alice, "second", None, crm_tables()).unwrap();
    let names: Vec<String> = service
        .list(&alice)
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(names, vec!["second", "first"]);
}

#[test]
fn test_list_skips_foreign_and_broken_files() {
    let (dir, service) = service();
    let alice = owner("alice");
    service.save(&alice, "crm", None, crm_tables()).unwrap();
    fs::write(dir.path().join("alice").join("notes.txt"), "hello").unwrap();
    fs::write(dir.path().join("alice").join("broken.json"), "{").unwrap();
    let items = service.list(&alice).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "crm");
    assert!(items[0].size.unwrap() > 0);
}

#[test]
fn test_delete() {
    let (_dir, service) = service();
    let alice = owner("alice");
    service.save(&alice, "crm", None, crm_tables()).unwrap();
    assert!(service.delete(&alice, "crm").unwrap());
    assert!(!service.delete(&alice, "crm").unwrap());
    assert!(service.get_raw(&alice, "crm").is_err());
}

#[test]
fn test_update_without_changes_is_noop() {
    let (dir, service) = service();
    let alice = owner("alice");
    let saved = service.save(&alice, "crm", None, crm_tables()).unwrap();
    let path = dir.path().join("alice").join("crm.json");
    let before = fs::read_to_string(&path).unwrap();

    let mut reordered = Tables::new();
    reordered.insert("Customers".into(), TableDef::with_columns(["id", "name"]));
    reordered.insert("orders".into(), TableDef::with_columns(["id", "cust_id"]));
    let outcome = service.update(&alice, "crm", reordered).unwrap();

    assert!(!outcome.updated);
    assert_eq!(outcome.reason, NO_CHANGES);
    assert_eq!(outcome.meta.updated_at, saved.updated_at);
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_update_with_changes_rewrites() {
    let (_dir, service) = service();
    let alice = owner("alice");
    let saved = service
        .save(&alice, "crm", Some("postgres".into()), crm_tables())
        .unwrap();
    let mut changed = crm_tables();
    changed.insert("invoices".into(), TableDef::with_columns(["id"]));
    let outcome = service.update(&alice, "crm", changed).unwrap();

    assert!(outcome.updated);
    assert_eq!(outcome.reason, SCHEMA_UPDATED);
    assert_ne!(outcome.meta.checksum, saved.checksum);
    assert_eq!(outcome.meta.dialect.as_deref(), Some("postgres"));
    assert!(service.get(&alice, "crm").unwrap().table("invoices").is_some());
}

#[test]
fn test_diff_against_stored() {
    let (_dir, service) = service();
    let alice = owner("alice");
    service.save(&alice, "crm", None, crm_tables()).unwrap();
    let mut proposed = crm_tables();
    proposed.shift_remove("customers");
    proposed.insert("orders".into(), TableDef::with_columns(["id", "cust_id", "total"]));
    let d = service.diff(&alice, "crm", proposed).unwrap();
    assert!(d.added.is_empty());
    assert_eq!(d.removed, vec!["customers"]);
    assert_eq!(d.changed[0].added_columns, vec!["total"]);
}

#[test]
fn test_missing_snapshot_errors() {
    let (_dir, service) = service();
    let alice = owner("alice");
    assert!(service.get(&alice, "nope").is_err());
    assert!(service.update(&alice, "nope", crm_tables()).is_err());
    assert!(service.diff(&alice, "nope", crm_tables()).is_err());
}

#[test]
fn test_invalid_names_are_rejected() {
    let (_dir, service) = service();
    let alice = owner("alice");
    for name in ["", "..", "a/b", "a\\b"] {
        assert!(service.save(&alice, name, None, crm_tables()).is_err(), "{:?}", name);
    }
    assert!(OwnerId::new("../etc").is_err());
}

#[test]
fn test_store_write_replaces_contents() {
    let dir = TempDir::new().unwrap();
    let store = FsSnapshotStore::new(dir.path());
    let alice = owner("alice");
    store.write(&alice, "doc", "one").unwrap();
    store.write(&alice, "doc", "two").unwrap();
    assert_eq!(store.read(&alice, "doc").unwrap().as_deref(), Some("two"));
    let objects = store.list(&alice).unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].size, 3);
}
