//! Flat backend adapter
//!
//! Emulates tables and schema versions on a single string key space.
//!
//! ## Layout
//!
//! ```text
//! namespace = name                  (default table)
//!           | name "/" table        (any other table)
//! key       = namespace ".__." user_key
//! version   = namespace ".__." version_key    -> "3"
//! ```
//!
//! Names may not contain `/` and neither names nor tables may contain the
//! marker or end with `.__`, so no namespace prefix is a prefix of another.
//! The version key is reserved within a namespace.
//!
//! ## Surfaces
//!
//! [`FlatStore`] works synchronously through its inherent methods and
//! asynchronously through [`KvStore`]. Both see the same data and share the
//! closed flag. Inherent methods shadow the trait ones, so async callers
//! either go through `Kvs` or call `KvStore::get(&store, ..)` explicitly.
//!
//! ## Concurrent opens
//!
//! Opens of one namespace on one storage are serialized. The async open
//! waits for a concurrent one; [`FlatStore::open_sync`] cannot wait and
//! fails with [`Error::OpenBlocked`] instead. Raising the schema version
//! closes every handle of the namespace opened before the upgrade.

use crate::iter::FlatEntries;
use crate::registry::{engine_id, OpenGuard, Retire};
use crate::upgrade::{run_upgrade, run_upgrade_sync, SchemaMeta, SchemaMetaSync};
use async_trait::async_trait;
use futures_util::stream;
use kvs_core::{
    codec, validate_version, EntryStream, Error, KvStore, Result, StoreIdentity, SyncUpgradeFn,
    UpgradeFn, Value, DEFAULT_VERSION_KEY, TABLE_KEY_MARKER,
};
use kvs_storage::FlatStorage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Options for a flat store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatOptions {
    version_key: String,
}

impl Default for FlatOptions {
    fn default() -> Self {
        Self {
            version_key: DEFAULT_VERSION_KEY.to_string(),
        }
    }
}

impl FlatOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Key under which the schema version is kept in each namespace.
    pub fn version_key(mut self, key: impl Into<String>) -> Self {
        self.version_key = key.into();
        self
    }

    /// Configured version key.
    pub fn get_version_key(&self) -> &str {
        &self.version_key
    }
}

fn validate_part(what: &str, part: &str) -> Result<()> {
    if part.contains(TABLE_KEY_MARKER) || part.ends_with(".__") {
        return Err(Error::InvalidArgument(format!(
            "{} '{}' must not contain '{}' or end with '.__'",
            what, part, TABLE_KEY_MARKER
        )));
    }
    Ok(())
}

/// Namespace of `identity`, validating its parts.
pub fn namespace(identity: &StoreIdentity) -> Result<String> {
    let name = identity.name();
    validate_part("store name", name)?;
    if name.contains('/') {
        return Err(Error::InvalidArgument(format!(
            "store name '{}' must not contain '/'",
            name
        )));
    }
    if identity.is_default_table() {
        return Ok(name.to_string());
    }
    validate_part("table name", identity.table_name())?;
    Ok(format!("{}/{}", name, identity.table_name()))
}

/// Store handle over a flat key space.
///
/// Cheap to clone; clones share the closed flag.
#[derive(Clone)]
pub struct FlatStore {
    inner: Arc<FlatInner>,
}

pub(crate) struct FlatInner {
    identity: StoreIdentity,
    storage: Arc<dyn FlatStorage>,
    prefix: String,
    version_key: String,
    closed: AtomicBool,
}

impl FlatStore {
    fn new(
        storage: Arc<dyn FlatStorage>,
        identity: StoreIdentity,
        version: u64,
        options: &FlatOptions,
    ) -> Result<Self> {
        validate_version(version)?;
        if options.version_key.is_empty() {
            return Err(Error::InvalidArgument("version key must not be empty".into()));
        }
        let prefix = format!("{}{}", namespace(&identity)?, TABLE_KEY_MARKER);
        let version_key = format!("{}{}", prefix, options.version_key);
        Ok(Self {
            inner: Arc::new(FlatInner {
                identity,
                storage,
                prefix,
                version_key,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Open `identity` at schema `version`, running an async migration.
    pub async fn open(
        storage: Arc<dyn FlatStorage>,
        identity: StoreIdentity,
        version: u64,
        options: FlatOptions,
        upgrade: Option<UpgradeFn<FlatStore>>,
    ) -> Result<Self> {
        let store = Self::new(storage, identity, version, &options)?;
        let guard = OpenGuard::acquire(store.engine_id(), &store.inner.identity).await;
        run_upgrade(&store, version, upgrade, &guard).await?;
        store.register(&guard);
        Ok(store)
    }

    /// Open `identity` at schema `version`, running a blocking migration.
    pub fn open_sync(
        storage: Arc<dyn FlatStorage>,
        identity: StoreIdentity,
        version: u64,
        options: FlatOptions,
        upgrade: Option<SyncUpgradeFn<FlatStore>>,
    ) -> Result<Self> {
        let store = Self::new(storage, identity, version, &options)?;
        let guard = OpenGuard::try_acquire(store.engine_id(), &store.inner.identity)?;
        run_upgrade_sync(&store, version, upgrade, &guard)?;
        store.register(&guard);
        debug!(store = %store.inner.identity, "opened flat store");
        Ok(store)
    }

    fn engine_id(&self) -> usize {
        engine_id(&self.inner.storage)
    }

    fn register(&self, guard: &OpenGuard) {
        let handle: Weak<FlatInner> = Arc::downgrade(&self.inner);
        guard.register(handle);
    }

    /// Identity this handle was opened with.
    pub fn identity(&self) -> &StoreIdentity {
        &self.inner.identity
    }

    /// Whether [`close`](Self::close) or [`drop_instance`](Self::drop_instance)
    /// has run.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.inner.check_open()?;
        let physical = self.inner.physical_key(key)?;
        self.inner.read(&physical)
    }

    /// Write a value, or delete the key when `value` is `None`.
    pub fn set(&self, key: &str, value: Option<Value>) -> Result<&Self> {
        match value {
            Some(value) => {
                self.inner.check_open()?;
                let physical = self.inner.physical_key(key)?;
                let text = codec::encode(&value)?;
                self.inner.storage.set_item(&physical, &text)?;
            }
            None => {
                self.delete(key)?;
            }
        }
        Ok(self)
    }

    /// Whether a value is stored under `key`.
    pub fn has(&self, key: &str) -> Result<bool> {
        self.inner.check_open()?;
        let physical = self.inner.physical_key(key)?;
        Ok(self.inner.storage.get_item(&physical).is_some())
    }

    /// Remove a key. Returns `true` whether or not it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.inner.check_open()?;
        let physical = self.inner.physical_key(key)?;
        self.inner.storage.remove_item(&physical)?;
        Ok(true)
    }

    /// Remove every entry of this namespace, keeping the schema version.
    pub fn clear(&self) -> Result<()> {
        self.inner.check_open()?;
        self.inner.storage.remove_items(&self.inner.user_keys())?;
        Ok(())
    }

    /// Remove every entry and the schema version, then close the handle.
    /// Other namespaces are untouched.
    pub fn drop_instance(&self) -> Result<()> {
        self.inner.check_open()?;
        self.inner
            .storage
            .remove_items(&self.inner.namespace_keys())?;
        self.inner.close();
        info!(store = %self.inner.identity, "store dropped");
        Ok(())
    }

    /// Close the handle. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Iterate the entries of this namespace.
    pub fn iter(&self) -> FlatEntries {
        let keys = if self.inner.is_closed() {
            Vec::new()
        } else {
            self.inner.user_keys()
        };
        FlatEntries::new(Arc::downgrade(&self.inner), keys)
    }
}

impl FlatInner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(store = %self.identity, "store closed");
        }
    }

    fn physical_key(&self, key: &str) -> Result<String> {
        let physical = format!("{}{}", self.prefix, key);
        if physical == self.version_key {
            return Err(Error::InvalidArgument(format!("key '{}' is reserved", key)));
        }
        Ok(physical)
    }

    /// Value under a user key, fetched lazily by iteration.
    pub(crate) fn read(&self, physical: &str) -> Result<Option<Value>> {
        match self.storage.get_item(physical) {
            Some(text) => Ok(Some(codec::decode(&text)?)),
            None => Ok(None),
        }
    }

    fn namespace_keys(&self) -> Vec<String> {
        self.storage
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(&self.prefix))
            .collect()
    }

    /// Physical keys holding user entries.
    fn user_keys(&self) -> Vec<String> {
        self.namespace_keys()
            .into_iter()
            .filter(|k| *k != self.version_key)
            .collect()
    }

    /// Strip the namespace prefix from a physical key.
    pub(crate) fn user_key<'k>(&self, physical: &'k str) -> &'k str {
        physical.strip_prefix(self.prefix.as_str()).unwrap_or(physical)
    }
}

impl Retire for FlatInner {
    fn retire(&self) {
        self.close();
    }
}

#[async_trait]
impl KvStore for FlatStore {
    fn identity(&self) -> &StoreIdentity {
        &self.inner.identity
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        FlatStore::get(self, key)
    }

    async fn set(&self, key: &str, value: Option<Value>) -> Result<&Self> {
        FlatStore::set(self, key, value)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        FlatStore::has(self, key)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        FlatStore::delete(self, key)
    }

    async fn clear(&self) -> Result<()> {
        FlatStore::clear(self)
    }

    async fn drop_instance(&self) -> Result<()> {
        FlatStore::drop_instance(self)
    }

    async fn close(&self) -> Result<()> {
        FlatStore::close(self);
        Ok(())
    }

    fn entries(&self) -> EntryStream<'static> {
        Box::pin(stream::iter(self.iter()))
    }
}

#[async_trait]
impl SchemaMeta for FlatStore {
    async fn stored_version(&self) -> Result<Option<u64>> {
        SchemaMetaSync::stored_version(self)
    }

    async fn store_version(&self, version: u64) -> Result<()> {
        SchemaMetaSync::store_version(self, version)
    }
}

impl SchemaMetaSync for FlatStore {
    fn stored_version(&self) -> Result<Option<u64>> {
        self.inner
            .storage
            .get_item(&self.inner.version_key)
            .map(|text| codec::decode_version(&text))
            .transpose()
    }

    fn store_version(&self, version: u64) -> Result<()> {
        self.inner
            .storage
            .set_item(&self.inner.version_key, &codec::encode_version(version))?;
        Ok(())
    }

    fn release(&self) {
        self.inner.close();
    }
}

impl std::fmt::Debug for FlatStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatStore")
            .field("identity", &self.inner.identity)
            .field("prefix", &self.inner.prefix)
            .field("closed", &self.is_closed())
            .finish()
    }
}
