//! Flat string key spaces
//!
//! A [`FlatStorage`] is one synchronous, engine-global map from string keys
//! to string values, shaped like a browser's localStorage. Keys are ordered
//! by [`FlatStorage::key`] index; the order is stable between mutations but
//! otherwise unspecified.
//!
//! ## Implementations
//!
//! - [`MemoryStorage`]: in-process map, with a process-wide instance
//! - [`FileStorage`]: JSON object file rewritten on every mutation

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;

/// A synchronous string key space.
///
/// Reads never fail. Writes may fail for storages backed by I/O; a failed
/// write leaves the storage as it was.
pub trait FlatStorage: Send + Sync {
    /// Number of keys.
    fn len(&self) -> usize;

    /// Whether there are no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key at `index`, `None` past the end.
    fn key(&self, index: usize) -> Option<String>;

    /// Value under `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Insert or replace.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove; absent keys are not an error.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Remove several keys at once; absent keys are skipped.
    ///
    /// The default removes them one at a time. Storages backed by I/O
    /// override it so the batch is applied in one write, or not at all.
    fn remove_items(&self, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            self.remove_item(key)?;
        }
        Ok(())
    }

    /// Remove every key of the storage.
    fn clear(&self) -> Result<(), StorageError>;

    /// Snapshot of all keys.
    ///
    /// The default walks [`key`](Self::key) by index; implementations
    /// override it with a single pass.
    fn keys(&self) -> Vec<String> {
        (0..self.len()).filter_map(|i| self.key(i)).collect()
    }
}
