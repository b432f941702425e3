//! In-memory flat storage.

use super::FlatStorage;
use crate::error::StorageError;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

static GLOBAL: Lazy<Arc<MemoryStorage>> = Lazy::new(|| Arc::new(MemoryStorage::new()));

/// Flat storage held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty, private storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide storage.
    pub fn global() -> Arc<MemoryStorage> {
        Arc::clone(&GLOBAL)
    }
}

impl FlatStorage for MemoryStorage {
    fn len(&self) -> usize {
        self.items.read().len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.items.read().keys().nth(index).cloned()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.write().remove(key);
        Ok(())
    }

    fn remove_items(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut items = self.items.write();
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.items.write().clear();
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.items.read().keys().cloned().collect()
    }
}
