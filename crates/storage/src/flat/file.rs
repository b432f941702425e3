//! File-backed flat storage.
//!
//! The whole key space is one JSON object. Every mutation rewrites the file
//! through a sibling temporary file and a rename, so a reader never sees a
//! half-written file. The in-memory map only changes once the file write
//! succeeded.

use super::FlatStorage;
use crate::error::StorageError;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

type Items = BTreeMap<String, String>;

/// Open file storages by absolute path.
static OPEN_FILES: Lazy<Mutex<HashMap<PathBuf, Weak<FileStorage>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Flat storage persisted to a JSON file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<Items>,
}

impl FileStorage {
    /// Open the storage at `path`, loading existing contents.
    ///
    /// A missing or empty file is an empty storage; the parent directory is
    /// created on demand.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Items::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| StorageError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Items::new(),
            Err(e) => return Err(e.into()),
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %path.display(), keys = items.len(), "opened file storage");
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    /// Open the storage at `path`, sharing one instance per file within the
    /// process so every handle sees the same contents.
    pub fn shared(path: impl AsRef<Path>) -> Result<Arc<Self>, StorageError> {
        let path = match path.as_ref() {
            p if p.is_absolute() => p.to_path_buf(),
            p => std::env::current_dir()?.join(p),
        };
        let mut open = OPEN_FILES.lock();
        if let Some(existing) = open.get(&path).and_then(Weak::upgrade) {
            return Ok(existing);
        }
        let storage = Arc::new(Self::open(&path)?);
        open.retain(|_, weak| weak.strong_count() > 0);
        open.insert(path, Arc::downgrade(&storage));
        Ok(storage)
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(&self, f: impl FnOnce(&mut Items)) -> Result<(), StorageError> {
        let mut items = self.items.lock();
        let mut next = items.clone();
        f(&mut next);
        if let Err(e) = self.persist(&next) {
            warn!(path = %self.path.display(), error = %e, "failed to persist file storage");
            return Err(e);
        }
        *items = next;
        Ok(())
    }

    /// `<file name>.tmp` next to the target, so no two targets share one.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist(&self, items: &Items) -> Result<(), StorageError> {
        let text = serde_json::to_string(items).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl FlatStorage for FileStorage {
    fn len(&self) -> usize {
        self.items.lock().len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.items.lock().keys().nth(index).cloned()
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        if !self.items.lock().contains_key(key) {
            return Ok(());
        }
        self.mutate(|items| {
            items.remove(key);
        })
    }

    fn remove_items(&self, keys: &[String]) -> Result<(), StorageError> {
        {
            let items = self.items.lock();
            if !keys.iter().any(|key| items.contains_key(key)) {
                return Ok(());
            }
        }
        self.mutate(|items| {
            for key in keys {
                items.remove(key);
            }
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.mutate(|items| items.clear())
    }

    fn keys(&self) -> Vec<String> {
        self.items.lock().keys().cloned().collect()
    }
}
