//! Flat Storage Tests

use kvs_storage::{FileStorage, FlatStorage, MemoryStorage};
use std::sync::Arc;
use tempfile::TempDir;

fn exercise(storage: &dyn FlatStorage) {
    storage.clear().unwrap();
    storage.set_item("x", "1").unwrap();
    storage.set_item("y", "2").unwrap();
    storage.set_item("x", "3").unwrap();
    assert_eq!(storage.len(), 2);
    assert_eq!(storage.get_item("x").as_deref(), Some("3"));
    assert_eq!(storage.keys(), vec!["x".to_string(), "y".to_string()]);

    let by_index: Vec<String> = (0..storage.len()).filter_map(|i| storage.key(i)).collect();
    assert_eq!(by_index, storage.keys());

    storage.remove_item("x").unwrap();
    assert_eq!(storage.get_item("x"), None);

    storage.set_item("z", "4").unwrap();
    storage
        .remove_items(&["y".to_string(), "absent".to_string()])
        .unwrap();
    assert_eq!(storage.keys(), vec!["z".to_string()]);
    storage.remove_items(&[]).unwrap();

    storage.clear().unwrap();
    assert!(storage.is_empty());
}

#[test]
fn memory_storage_contract() {
    exercise(&MemoryStorage::new());
}

#[test]
fn file_storage_contract() {
    let dir = TempDir::new().unwrap();
    exercise(&FileStorage::open(dir.path().join("s.json")).unwrap());
}

#[test]
fn file_is_json_object() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s.json");
    let storage = FileStorage::open(&path).unwrap();
    storage.set_item("app.__.k", "\"v\"").unwrap();

    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk, serde_json::json!({"app.__.k": "\"v\""}));
}

#[test]
fn shared_file_storage_is_reopened_after_last_handle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s.json");
    let first = FileStorage::shared(&path).unwrap();
    first.set_item("k", "v").unwrap();
    let weak = Arc::downgrade(&first);
    drop(first);
    assert!(weak.upgrade().is_none());

    let second = FileStorage::shared(&path).unwrap();
    assert_eq!(second.get_item("k").as_deref(), Some("v"));
}
