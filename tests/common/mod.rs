//! Shared test harness
//!
//! Every contract test runs once per engine. Each run gets private engine
//! instances so tests never see each other's data.

#![allow(dead_code)]

use futures_util::StreamExt;
use kvs::{FileStorage, IdbFactory, MemoryStorage};
use std::sync::{Arc, Once};
use tempfile::TempDir;

pub use kvs::prelude::*;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Engine a test runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Indexed,
    Memory,
    File,
}

/// One private engine instance.
pub struct TestEnv {
    pub engine: Engine,
    backend: Backend,
    _dir: Option<TempDir>,
}

impl TestEnv {
    pub fn new(engine: Engine) -> Self {
        init_tracing();
        match engine {
            Engine::Indexed => Self {
                engine,
                backend: Backend::Indexed(Arc::new(IdbFactory::new())),
                _dir: None,
            },
            Engine::Memory => Self {
                engine,
                backend: Backend::Flat(Arc::new(MemoryStorage::new())),
                _dir: None,
            },
            Engine::File => {
                let dir = TempDir::new().expect("temp dir");
                let storage =
                    FileStorage::open(dir.path().join("local.json")).expect("file storage");
                Self {
                    engine,
                    backend: Backend::Flat(Arc::new(storage)),
                    _dir: Some(dir),
                }
            }
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend.clone()
    }

    pub fn options(&self) -> OpenOptions {
        OpenOptions::new().backend(self.backend())
    }

    pub fn is_flat(&self) -> bool {
        self.engine != Engine::Indexed
    }

    /// Open `name` with the default table and no callback.
    pub async fn open(&self, name: &str, version: u64) -> Kvs {
        Kvs::open(name, version, self.options())
            .await
            .unwrap_or_else(|e| panic!("{:?}: open {name}@{version}: {e}", self.engine))
    }

    /// Open `name`/`table` with no callback.
    pub async fn open_table(&self, name: &str, table: &str, version: u64) -> Kvs {
        Kvs::open(name, version, self.options().table_name(table))
            .await
            .unwrap_or_else(|e| panic!("{:?}: open {name}/{table}@{version}: {e}", self.engine))
    }
}

/// One environment per engine.
pub fn environments() -> Vec<TestEnv> {
    [Engine::Indexed, Engine::Memory, Engine::File]
        .into_iter()
        .map(TestEnv::new)
        .collect()
}

/// Drain a store's entries, sorted by key.
pub async fn collect_entries(store: &Kvs) -> Vec<(String, Value)> {
    let mut entries: Vec<(String, Value)> = store
        .entries()
        .map(|entry| entry.expect("entry"))
        .collect()
        .await;
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

/// Sorted keys of a store.
pub async fn collect_keys(store: &Kvs) -> Vec<String> {
    collect_entries(store)
        .await
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}
