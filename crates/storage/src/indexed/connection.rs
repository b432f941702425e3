//! Connections and version changes.

use super::transaction::{Transaction, TransactionMode};
use super::DatabaseData;
use crate::error::EngineError;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tracing::debug;

type VersionChangeHandler = Arc<dyn Fn(&VersionChangeEvent) + Send + Sync>;

/// Sent to open connections before a version change or a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionChangeEvent {
    /// Version of the database now
    pub old_version: u64,
    /// Version being opened, `None` when the database is being deleted
    pub new_version: Option<u64>,
}

struct ConnectionSlot {
    id: u64,
    handler: Option<VersionChangeHandler>,
}

/// Shared state of one named database.
pub(crate) struct Database {
    pub(crate) name: String,
    pub(crate) data: Arc<RwLock<DatabaseData>>,
    connections: Mutex<Vec<ConnectionSlot>>,
}

impl Database {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Arc::new(RwLock::new(DatabaseData::default())),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Register a new open connection. Caller holds the data lock.
    pub(crate) fn register(
        self: &Arc<Self>,
        id: u64,
        version: u64,
        store_names: Vec<String>,
    ) -> Connection {
        self.connections.lock().push(ConnectionSlot { id, handler: None });
        Connection {
            id,
            version,
            store_names,
            database: Arc::clone(self),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn unregister(&self, id: u64) {
        self.connections.lock().retain(|slot| slot.id != id);
    }

    fn set_handler(&self, id: u64, handler: VersionChangeHandler) {
        if let Some(slot) = self.connections.lock().iter_mut().find(|slot| slot.id == id) {
            slot.handler = Some(handler);
        }
    }

    pub(crate) fn open_connections(&self) -> usize {
        self.connections.lock().len()
    }

    /// Run every registered handler. The registry is not locked while
    /// handlers run, so they may close their own connection.
    pub(crate) fn notify_version_change(&self, event: &VersionChangeEvent) {
        let handlers: Vec<VersionChangeHandler> = self
            .connections
            .lock()
            .iter()
            .filter_map(|slot| slot.handler.clone())
            .collect();
        debug!(
            database = %self.name,
            handlers = handlers.len(),
            old_version = event.old_version,
            new_version = ?event.new_version,
            "notifying open connections of version change"
        );
        for handler in handlers {
            handler(event);
        }
    }
}

/// One open handle to a database.
///
/// Dropping the connection closes it.
pub struct Connection {
    id: u64,
    version: u64,
    store_names: Vec<String>,
    database: Arc<Database>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Database name.
    pub fn name(&self) -> &str {
        &self.database.name
    }

    /// Version the database had when this connection opened.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Object stores present when this connection opened, sorted.
    pub fn object_store_names(&self) -> &[String] {
        &self.store_names
    }

    /// Whether an object store existed when this connection opened.
    pub fn has_object_store(&self, name: &str) -> bool {
        self.store_names.iter().any(|n| n == name)
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        self.closer().close();
    }

    /// A detached handle that can close this connection later, e.g. from a
    /// version-change handler.
    pub fn closer(&self) -> Closer {
        Closer {
            id: self.id,
            database: Arc::downgrade(&self.database),
            closed: Arc::clone(&self.closed),
        }
    }

    /// Install the handler run when another opener needs a version change
    /// or a deletion. Replaces any previous handler.
    pub fn on_version_change<F>(&self, handler: F)
    where
        F: Fn(&VersionChangeEvent) + Send + Sync + 'static,
    {
        self.database.set_handler(self.id, Arc::new(handler));
    }

    /// Start a transaction over `store_names`.
    ///
    /// Waits while an exclusive transaction holds the database.
    pub async fn transaction(
        &self,
        store_names: &[&str],
        mode: TransactionMode,
    ) -> Result<Transaction, EngineError> {
        if self.is_closed() {
            return Err(EngineError::InvalidState("connection is closed".into()));
        }
        if store_names.is_empty() {
            return Err(EngineError::InvalidState(
                "transaction needs at least one object store".into(),
            ));
        }
        for name in store_names {
            if !self.has_object_store(name) {
                return Err(EngineError::NotFound((*name).to_string()));
            }
        }
        let scope = store_names.iter().map(|s| s.to_string()).collect();
        Transaction::begin(
            Arc::clone(&self.database.data),
            scope,
            mode,
            Arc::clone(&self.closed),
        )
        .await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &self.database.name)
            .field("version", &self.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Closes a connection without owning it.
#[derive(Clone)]
pub struct Closer {
    id: u64,
    database: Weak<Database>,
    closed: Arc<AtomicBool>,
}

impl Closer {
    /// Close the connection. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(database) = self.database.upgrade() {
            database.unregister(self.id);
            debug!(database = %database.name, connection = self.id, "connection closed");
        }
    }
}

/// Schema changes allowed while a database moves to a new version.
#[derive(Debug)]
pub struct VersionChange {
    old_version: u64,
    new_version: u64,
    names: BTreeSet<String>,
    deleted: BTreeSet<String>,
}

impl VersionChange {
    pub(crate) fn new(old_version: u64, new_version: u64, existing: BTreeSet<String>) -> Self {
        Self {
            old_version,
            new_version,
            names: existing,
            deleted: BTreeSet::new(),
        }
    }

    /// Version before this change; `0` for a database being created.
    pub fn old_version(&self) -> u64 {
        self.old_version
    }

    /// Version after this change.
    pub fn new_version(&self) -> u64 {
        self.new_version
    }

    /// Object stores as of now within the change, sorted.
    pub fn object_store_names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    /// Whether an object store exists within the change.
    pub fn has_object_store(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Create an empty object store.
    pub fn create_object_store(&mut self, name: &str) -> Result<(), EngineError> {
        if name.is_empty() {
            return Err(EngineError::InvalidName(name.to_string()));
        }
        if !self.names.insert(name.to_string()) {
            return Err(EngineError::Constraint(name.to_string()));
        }
        Ok(())
    }

    /// Delete an object store and its records.
    pub fn delete_object_store(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.names.remove(name) {
            return Err(EngineError::NotFound(name.to_string()));
        }
        self.deleted.insert(name.to_string());
        Ok(())
    }

    /// Apply the change to the database data.
    pub(crate) fn apply(self, data: &mut DatabaseData) {
        for name in &self.deleted {
            data.stores.remove(name);
        }
        for name in self.names {
            data.stores.entry(name).or_default();
        }
        data.version = self.new_version;
    }
}
