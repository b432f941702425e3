//! Transactional backend adapter
//!
//! Maps a store identity onto the object-store engine:
//!
//! - one engine database per store `name`
//! - one object store per `table_name`
//! - a reserved object store, [`META_STORE_NAME`], mapping each table name
//!   to its schema version
//!
//! ## Opening
//!
//! The database is first opened at whatever version it has. If the table or
//! the metadata store is missing, the connection is closed and the database
//! reopened one version higher, creating both in the version-change step.
//! The engine version therefore counts structural changes and is unrelated
//! to the caller's schema version.
//!
//! Each connection closes itself when another opener needs a version change
//! or deletes the database; later operations on this handle fail with
//! [`Error::Closed`].
//!
//! Schema versions live in the metadata store, not in the engine version.
//! Raising one is coordinated per identity: opens wait for each other, and
//! an upgrade closes the handles of that table opened at the older version.

use crate::iter::CursorEntries;
use crate::registry::{engine_id, OpenGuard, Retire};
use crate::upgrade::{run_upgrade, SchemaMeta};
use async_trait::async_trait;
use kvs_core::{
    validate_version, EntryStream, Error, KvStore, Result, StoreIdentity, UpgradeFn, Value,
    META_STORE_NAME,
};
use kvs_storage::{
    Connection, EngineError, IdbFactory, KeyRange, ObjectStore, ReadyState, Request,
    TransactionMode, VersionChange,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Attempts at creating a missing table before giving up; each attempt
/// loses only to a concurrent structural change.
const MAX_OPEN_ATTEMPTS: usize = 8;

/// Error of a request once it has settled.
///
/// `None` while the request is still pending: an unsettled request has no
/// error yet, the caller falls back to the transaction's outcome.
pub fn settled_error<T: Clone>(request: &Request<T>) -> Option<EngineError> {
    match request.ready_state() {
        ReadyState::Pending => None,
        ReadyState::Done => request.error().ok().flatten(),
    }
}

fn open_error(e: EngineError) -> Error {
    match e {
        EngineError::Blocked { .. } => Error::OpenBlocked(e.to_string()),
        other => Error::OpenFailed(other.to_string()),
    }
}

fn tx_error(e: EngineError) -> Error {
    Error::TransactionFailed(e.to_string())
}

/// Store handle over the transactional engine.
///
/// Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct IndexedStore {
    inner: Arc<IndexedInner>,
}

pub(crate) struct IndexedInner {
    identity: StoreIdentity,
    factory: Arc<IdbFactory>,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl IndexedStore {
    /// Open `identity` at schema `version` on `factory`.
    pub async fn open(
        factory: Arc<IdbFactory>,
        identity: StoreIdentity,
        version: u64,
        upgrade: Option<UpgradeFn<IndexedStore>>,
    ) -> Result<Self> {
        validate_version(version)?;
        if identity.table_name() == META_STORE_NAME {
            return Err(Error::InvalidArgument(format!(
                "table name '{}' is reserved",
                META_STORE_NAME
            )));
        }

        let guard = OpenGuard::acquire(engine_id(&factory), &identity).await;
        let connection = open_connection(&factory, &identity).await?;
        let closer = connection.closer();
        let store_name = identity.to_string();
        connection.on_version_change(move |event| {
            info!(store = %store_name, ?event, "closing connection for version change");
            closer.close();
        });

        let store = IndexedStore {
            inner: Arc::new(IndexedInner {
                identity,
                factory,
                connection: Mutex::new(Some(Arc::new(connection))),
            }),
        };
        run_upgrade(&store, version, upgrade, &guard).await?;
        let handle: Weak<IndexedInner> = Arc::downgrade(&store.inner);
        guard.register(handle);
        Ok(store)
    }

    /// A cursor over the table, positioned before the first key.
    pub fn cursor(&self) -> CursorEntries {
        CursorEntries::new(Arc::downgrade(&self.inner))
    }

    /// Whether the connection has been closed, by [`KvStore::close`] or by
    /// another opener.
    pub fn is_closed(&self) -> bool {
        self.inner.connection().is_err()
    }
}

fn ensure_stores(change: &mut VersionChange, table: &str) -> std::result::Result<(), EngineError> {
    if !change.has_object_store(table) {
        change.create_object_store(table)?;
    }
    if !change.has_object_store(META_STORE_NAME) {
        change.create_object_store(META_STORE_NAME)?;
    }
    Ok(())
}

async fn open_connection(factory: &IdbFactory, identity: &StoreIdentity) -> Result<Connection> {
    let name = identity.name();
    let table = identity.table_name();
    let ready = |conn: &Connection| {
        conn.has_object_store(table) && conn.has_object_store(META_STORE_NAME)
    };

    for _ in 0..MAX_OPEN_ATTEMPTS {
        let conn = factory
            .open(name, None, |change| ensure_stores(change, table))
            .await
            .map_err(open_error)?;
        if ready(&conn) {
            return Ok(conn);
        }

        let next = conn.version() + 1;
        conn.close();
        drop(conn);
        debug!(database = name, table, version = next, "creating table");

        match factory
            .open(name, Some(next), |change| ensure_stores(change, table))
            .await
        {
            Ok(conn) if ready(&conn) => return Ok(conn),
            Ok(conn) => conn.close(),
            // Someone else moved the database past `next`; look again
            Err(EngineError::Version { .. }) => {}
            Err(e) => return Err(open_error(e)),
        }
    }
    Err(Error::OpenFailed(format!(
        "could not create table '{}' in database '{}'",
        table, name
    )))
}

impl IndexedInner {
    fn connection(&self) -> Result<Arc<Connection>> {
        match self.connection.lock().as_ref() {
            Some(conn) if !conn.is_closed() => Ok(Arc::clone(conn)),
            _ => Err(Error::Closed),
        }
    }

    fn table(&self) -> &str {
        self.identity.table_name()
    }

    fn close(&self) {
        if let Some(conn) = self.connection.lock().take() {
            conn.close();
            debug!(store = %self.identity, "store closed");
        }
    }

    async fn read<T: Clone>(
        &self,
        store: &str,
        op: impl FnOnce(&ObjectStore<'_>) -> std::result::Result<Request<T>, EngineError>,
    ) -> Result<T> {
        let conn = self.connection()?;
        let mut tx = conn
            .transaction(&[store], TransactionMode::ReadOnly)
            .await
            .map_err(tx_error)?;
        let request = op(&tx.object_store(store).map_err(tx_error)?).map_err(tx_error)?;
        request.result().map_err(tx_error)
    }

    async fn write(
        &self,
        store: &str,
        op: impl FnOnce(&mut ObjectStore<'_>) -> std::result::Result<Request<()>, EngineError>,
    ) -> Result<()> {
        let conn = self.connection()?;
        let mut tx = conn
            .transaction(&[store], TransactionMode::ReadWrite)
            .await
            .map_err(tx_error)?;
        let request = op(&mut tx.object_store(store).map_err(tx_error)?).map_err(tx_error)?;
        let committed = tx.commit().await;
        if let Some(e) = settled_error(&request) {
            return Err(tx_error(e));
        }
        committed.map_err(tx_error)
    }

    /// First entry of the table within `range`, for cursor iteration.
    pub(crate) async fn read_cursor(&self, range: KeyRange) -> Result<Option<(String, Value)>> {
        self.read(self.table(), |store| store.open_cursor(&range)).await
    }
}

impl Retire for IndexedInner {
    fn retire(&self) {
        self.close();
    }
}

#[async_trait]
impl KvStore for IndexedStore {
    fn identity(&self) -> &StoreIdentity {
        &self.inner.identity
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.read(self.inner.table(), |store| store.get(key)).await
    }

    async fn set(&self, key: &str, value: Option<Value>) -> Result<&Self> {
        match value {
            Some(value) => {
                self.inner
                    .write(self.inner.table(), |store| store.put(key, value))
                    .await?
            }
            None => {
                self.inner
                    .write(self.inner.table(), |store| store.delete(key))
                    .await?
            }
        }
        Ok(self)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let count = self
            .inner
            .read(self.inner.table(), |store| store.count(key))
            .await?;
        Ok(count > 0)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner
            .write(self.inner.table(), |store| store.delete(key))
            .await?;
        Ok(true)
    }

    async fn clear(&self) -> Result<()> {
        self.inner
            .write(self.inner.table(), |store| store.clear())
            .await
    }

    async fn drop_instance(&self) -> Result<()> {
        self.inner.close();
        let name = self.inner.identity.name();
        self.inner
            .factory
            .delete_database(name)
            .await
            .map_err(open_error)?;
        info!(database = name, "store dropped");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close();
        Ok(())
    }

    fn entries(&self) -> EntryStream<'static> {
        Box::pin(self.cursor())
    }
}

#[async_trait]
impl SchemaMeta for IndexedStore {
    async fn stored_version(&self) -> Result<Option<u64>> {
        let table = self.inner.table().to_string();
        let stored = self
            .inner
            .read(META_STORE_NAME, |store| store.get(&table))
            .await?;
        match stored {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                Error::Serialization(format!("schema version is not an integer: {}", value))
            }),
        }
    }

    async fn store_version(&self, version: u64) -> Result<()> {
        let table = self.inner.table().to_string();
        self.inner
            .write(META_STORE_NAME, |store| store.put(&table, Value::from(version)))
            .await
    }
}

impl std::fmt::Debug for IndexedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedStore")
            .field("identity", &self.inner.identity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
