//! Transactions and object-store operations.
//!
//! A read-write transaction applies writes in place under an exclusive lock
//! and keeps an undo log; commit drops the log, abort replays it backwards.
//! Write requests stay [`ReadyState::Pending`](super::ReadyState::Pending)
//! until the transaction finishes.

use super::request::Request;
use super::{DatabaseData, StoreData};
use crate::error::EngineError;
use kvs_core::Value;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Shared, reads only
    ReadOnly,
    /// Exclusive, reads and writes
    ReadWrite,
}

/// Where a cursor read starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
    /// From the first key
    All,
    /// From the first key strictly greater than this one
    After(String),
}

enum DataGuard {
    Read(OwnedRwLockReadGuard<DatabaseData>),
    Write(OwnedRwLockWriteGuard<DatabaseData>),
}

impl DataGuard {
    fn data(&self) -> &DatabaseData {
        match self {
            DataGuard::Read(g) => g,
            DataGuard::Write(g) => g,
        }
    }
}

enum Undo {
    Record {
        store: String,
        key: String,
        previous: Option<Value>,
    },
    Store {
        store: String,
        previous: StoreData,
    },
}

/// A unit of work over a fixed set of object stores.
pub struct Transaction {
    mode: TransactionMode,
    scope: Vec<String>,
    guard: Option<DataGuard>,
    undo: Vec<Undo>,
    pending: Vec<Request<()>>,
    connection_closed: Arc<AtomicBool>,
}

impl Transaction {
    pub(crate) async fn begin(
        data: Arc<RwLock<DatabaseData>>,
        scope: Vec<String>,
        mode: TransactionMode,
        connection_closed: Arc<AtomicBool>,
    ) -> Result<Self, EngineError> {
        let guard = match mode {
            TransactionMode::ReadOnly => DataGuard::Read(data.read_owned().await),
            TransactionMode::ReadWrite => DataGuard::Write(data.write_owned().await),
        };
        if guard.data().deleted {
            return Err(EngineError::InvalidState("database was deleted".into()));
        }
        for name in &scope {
            if !guard.data().stores.contains_key(name) {
                return Err(EngineError::NotFound(name.clone()));
            }
        }
        Ok(Self {
            mode,
            scope,
            guard: Some(guard),
            undo: Vec::new(),
            pending: Vec::new(),
            connection_closed,
        })
    }

    /// Access mode.
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Whether commit or abort has run.
    pub fn is_finished(&self) -> bool {
        self.guard.is_none()
    }

    /// Operations on one object store of the scope.
    pub fn object_store(&mut self, name: &str) -> Result<ObjectStore<'_>, EngineError> {
        if self.is_finished() {
            return Err(EngineError::InvalidState("transaction has finished".into()));
        }
        if !self.scope.iter().any(|s| s == name) {
            return Err(EngineError::NotFound(name.to_string()));
        }
        Ok(ObjectStore {
            tx: self,
            name: name.to_string(),
        })
    }

    /// Commit: every write becomes visible and its request settles.
    ///
    /// Fails with [`EngineError::Aborted`] and rolls back if the owning
    /// connection was closed in the meantime.
    pub async fn commit(mut self) -> Result<(), EngineError> {
        tokio::task::yield_now().await;
        if self.connection_closed.load(Ordering::Acquire) {
            let err = EngineError::Aborted("connection closed before commit".into());
            self.rollback(&err);
            return Err(err);
        }
        for request in self.pending.drain(..) {
            request.settle(());
        }
        self.undo.clear();
        self.guard = None;
        Ok(())
    }

    /// Roll back every write and fail pending requests.
    pub fn abort(mut self) {
        self.rollback(&EngineError::Aborted("aborted by caller".into()));
    }

    fn rollback(&mut self, error: &EngineError) {
        let Some(guard) = self.guard.as_mut() else {
            return;
        };
        if let DataGuard::Write(data) = guard {
            for undo in self.undo.drain(..).rev() {
                match undo {
                    Undo::Record {
                        store,
                        key,
                        previous,
                    } => {
                        if let Some(records) = data.stores.get_mut(&store) {
                            match previous {
                                Some(value) => {
                                    records.insert(key, value);
                                }
                                None => {
                                    records.remove(&key);
                                }
                            }
                        }
                    }
                    Undo::Store { store, previous } => {
                        data.stores.insert(store, previous);
                    }
                }
            }
        }
        for request in self.pending.drain(..) {
            request.fail(error.clone());
        }
        self.guard = None;
    }

    fn records(&self, store: &str) -> Result<&StoreData, EngineError> {
        let guard = self
            .guard
            .as_ref()
            .ok_or_else(|| EngineError::InvalidState("transaction has finished".into()))?;
        guard
            .data()
            .stores
            .get(store)
            .ok_or_else(|| EngineError::NotFound(store.to_string()))
    }

    fn records_mut(&mut self, store: &str) -> Result<&mut StoreData, EngineError> {
        match self.guard.as_mut() {
            None => Err(EngineError::InvalidState("transaction has finished".into())),
            Some(DataGuard::Read(_)) => Err(EngineError::ReadOnly),
            Some(DataGuard::Write(data)) => data
                .stores
                .get_mut(store)
                .ok_or_else(|| EngineError::NotFound(store.to_string())),
        }
    }

    fn queue(&mut self, undo: Undo) -> Request<()> {
        self.undo.push(undo);
        let request = Request::pending();
        self.pending.push(request.clone());
        request
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.rollback(&EngineError::Aborted(
            "transaction dropped before commit".into(),
        ));
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("mode", &self.mode)
            .field("scope", &self.scope)
            .field("finished", &self.is_finished())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// One object store seen through a transaction.
pub struct ObjectStore<'t> {
    tx: &'t mut Transaction,
    name: String,
}

impl ObjectStore<'_> {
    /// Object store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Request<Option<Value>>, EngineError> {
        let value = self.tx.records(&self.name)?.get(key).cloned();
        Ok(Request::done(value))
    }

    /// Number of records under `key`: 0 or 1.
    pub fn count(&self, key: &str) -> Result<Request<u64>, EngineError> {
        let present = self.tx.records(&self.name)?.contains_key(key);
        Ok(Request::done(u64::from(present)))
    }

    /// Number of records in the store.
    pub fn count_all(&self) -> Result<Request<u64>, EngineError> {
        let len = self.tx.records(&self.name)?.len() as u64;
        Ok(Request::done(len))
    }

    /// First record in key order within `range`.
    pub fn open_cursor(
        &self,
        range: &KeyRange,
    ) -> Result<Request<Option<(String, Value)>>, EngineError> {
        let records = self.tx.records(&self.name)?;
        let lower = match range {
            KeyRange::All => Bound::Unbounded,
            KeyRange::After(key) => Bound::Excluded(key.as_str()),
        };
        let first = records
            .range::<str, _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(Request::done(first))
    }

    /// Insert or replace a record.
    pub fn put(&mut self, key: &str, value: Value) -> Result<Request<()>, EngineError> {
        let previous = self.tx.records_mut(&self.name)?.insert(key.to_string(), value);
        Ok(self.tx.queue(Undo::Record {
            store: self.name.clone(),
            key: key.to_string(),
            previous,
        }))
    }

    /// Remove a record; absent keys are not an error.
    pub fn delete(&mut self, key: &str) -> Result<Request<()>, EngineError> {
        let previous = self.tx.records_mut(&self.name)?.remove(key);
        Ok(self.tx.queue(Undo::Record {
            store: self.name.clone(),
            key: key.to_string(),
            previous,
        }))
    }

    /// Remove every record.
    pub fn clear(&mut self) -> Result<Request<()>, EngineError> {
        let previous = std::mem::take(self.tx.records_mut(&self.name)?);
        Ok(self.tx.queue(Undo::Store {
            store: self.name.clone(),
            previous,
        }))
    }
}
