//! Main entry point for kvs.
//!
//! This module provides [`Kvs`], the store handle callers work with, the
//! [`OpenOptions`] it is opened with and the [`KvsBuilder`] that derives
//! both from configuration.

use crate::config::{BackendConfig, KvsConfig};
use crate::error::Result;
use async_trait::async_trait;
use kvs_core::{
    upgrade_fn, EntryStream, KvStore, StoreIdentity, UpgradeContext, UpgradeFn, Value,
    DEFAULT_TABLE_NAME, DEFAULT_VERSION_KEY,
};
use kvs_engine::{FlatOptions, FlatStore, IndexedStore};
use kvs_storage::{FileStorage, FlatStorage, IdbFactory, MemoryStorage};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// The engine a store lives in.
#[derive(Clone)]
pub enum Backend {
    /// Transactional object-store engine
    Indexed(Arc<IdbFactory>),
    /// Flat string key space
    Flat(Arc<dyn FlatStorage>),
}

impl Backend {
    /// The process-wide transactional engine.
    pub fn indexed() -> Self {
        Backend::Indexed(IdbFactory::global())
    }

    /// The process-wide in-memory flat storage.
    pub fn memory() -> Self {
        Backend::Flat(MemoryStorage::global())
    }

    /// A flat storage persisted to `path`, shared with every other handle
    /// on the same file.
    pub fn file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Backend::Flat(FileStorage::shared(path)?))
    }

    fn kind(&self) -> &'static str {
        match self {
            Backend::Indexed(_) => "indexed",
            Backend::Flat(_) => "flat",
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::indexed()
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Indexed(factory) => f.debug_tuple("Indexed").field(factory).finish(),
            Backend::Flat(_) => f.debug_tuple("Flat").finish(),
        }
    }
}

/// How to open a store.
///
/// # Example
///
/// ```ignore
/// let options = OpenOptions::new()
///     .backend(Backend::memory())
///     .table_name("sessions")
///     .upgrade(|ctx| async move {
///         ctx.store.clear().await?;
///         Ok::<_, anyhow::Error>(())
///     });
/// ```
pub struct OpenOptions {
    backend: Backend,
    table_name: String,
    version_key: String,
    upgrade: Option<UpgradeFn<Kvs>>,
}

impl OpenOptions {
    /// Default options: the global transactional engine, the default
    /// table, no upgrade callback.
    pub fn new() -> Self {
        Self {
            backend: Backend::default(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            version_key: DEFAULT_VERSION_KEY.to_string(),
            upgrade: None,
        }
    }

    /// Engine to open the store in.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Table within the store.
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Key holding the schema version in flat key spaces. The
    /// transactional engine keeps versions in its metadata store instead.
    pub fn version_key(mut self, version_key: impl Into<String>) -> Self {
        self.version_key = version_key.into();
        self
    }

    /// Migration run when the persisted version is lower than the
    /// requested one.
    pub fn upgrade<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(UpgradeContext<Kvs>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.upgrade = Some(upgrade_fn(f));
        self
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenOptions")
            .field("backend", &self.backend)
            .field("table_name", &self.table_name)
            .field("version_key", &self.version_key)
            .field("upgrade", &self.upgrade.is_some())
            .finish()
    }
}

/// Hand an adapter-level callback the facade handle.
fn adapt<S: 'static>(upgrade: UpgradeFn<Kvs>, wrap: fn(S) -> Kvs) -> UpgradeFn<S> {
    Box::new(move |ctx: UpgradeContext<S>| {
        upgrade(UpgradeContext {
            store: wrap(ctx.store),
            old_version: ctx.old_version,
            new_version: ctx.new_version,
        })
    })
}

/// An open store.
///
/// Clones share the connection; closing one closes all of them.
///
/// # Example
///
/// ```ignore
/// use kvs::prelude::*;
///
/// let store = Kvs::open("app", 1, OpenOptions::new()).await?;
/// store.set("a", Some(json!(1))).await?.set("b", Some(json!(2))).await?;
/// assert_eq!(store.get("a").await?, Some(json!(1)));
/// store.drop_instance().await?;
/// ```
#[derive(Clone, Debug)]
pub enum Kvs {
    /// Store in the transactional engine
    Indexed(IndexedStore),
    /// Store in a flat key space
    Flat(FlatStore),
}

impl Kvs {
    /// Open store `name` at schema `version`.
    ///
    /// # Errors
    ///
    /// - [`InvalidArgument`](crate::Error::InvalidArgument) for an empty
    ///   name, a version of 0 or a reserved table name
    /// - [`VersionDowngrade`](crate::Error::VersionDowngrade) when the
    ///   persisted version is higher
    /// - [`UpgradeFailed`](crate::Error::UpgradeFailed) when the callback
    ///   fails; the version is not bumped
    /// - [`OpenBlocked`](crate::Error::OpenBlocked) when other connections
    ///   prevent the open
    pub async fn open(name: &str, version: u64, options: OpenOptions) -> Result<Kvs> {
        let identity = StoreIdentity::new(name, options.table_name)?;
        debug!(
            name = identity.name(),
            table = identity.table_name(),
            version,
            backend = options.backend.kind(),
            "opening store"
        );
        match options.backend {
            Backend::Indexed(factory) => {
                let upgrade = options.upgrade.map(|f| adapt(f, Kvs::Indexed));
                let store = IndexedStore::open(factory, identity, version, upgrade).await?;
                Ok(Kvs::Indexed(store))
            }
            Backend::Flat(storage) => {
                let upgrade = options.upgrade.map(|f| adapt(f, Kvs::Flat));
                let flat_options = FlatOptions::new().version_key(options.version_key);
                let store =
                    FlatStore::open(storage, identity, version, flat_options, upgrade).await?;
                Ok(Kvs::Flat(store))
            }
        }
    }

    /// Create a builder.
    pub fn builder() -> KvsBuilder {
        KvsBuilder::new()
    }

    /// Whether the handle was closed or dropped.
    pub fn is_closed(&self) -> bool {
        match self {
            Kvs::Indexed(store) => store.is_closed(),
            Kvs::Flat(store) => store.is_closed(),
        }
    }
}

#[async_trait]
impl KvStore for Kvs {
    fn identity(&self) -> &StoreIdentity {
        match self {
            Kvs::Indexed(store) => KvStore::identity(store),
            Kvs::Flat(store) => KvStore::identity(store),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        match self {
            Kvs::Indexed(store) => KvStore::get(store, key).await,
            Kvs::Flat(store) => KvStore::get(store, key).await,
        }
    }

    async fn set(&self, key: &str, value: Option<Value>) -> Result<&Self> {
        match self {
            Kvs::Indexed(store) => {
                KvStore::set(store, key, value).await?;
            }
            Kvs::Flat(store) => {
                KvStore::set(store, key, value).await?;
            }
        }
        Ok(self)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        match self {
            Kvs::Indexed(store) => KvStore::has(store, key).await,
            Kvs::Flat(store) => KvStore::has(store, key).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match self {
            Kvs::Indexed(store) => KvStore::delete(store, key).await,
            Kvs::Flat(store) => KvStore::delete(store, key).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Kvs::Indexed(store) => KvStore::clear(store).await,
            Kvs::Flat(store) => KvStore::clear(store).await,
        }
    }

    async fn drop_instance(&self) -> Result<()> {
        match self {
            Kvs::Indexed(store) => KvStore::drop_instance(store).await,
            Kvs::Flat(store) => KvStore::drop_instance(store).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Kvs::Indexed(store) => KvStore::close(store).await,
            Kvs::Flat(store) => KvStore::close(store).await,
        }
    }

    fn entries(&self) -> EntryStream<'static> {
        match self {
            Kvs::Indexed(store) => KvStore::entries(store),
            Kvs::Flat(store) => KvStore::entries(store),
        }
    }
}

/// Builder for opening stores from settings.
///
/// # Example
///
/// ```ignore
/// // Production: settings file
/// let config = KvsConfig::from_file("kvs.toml")?;
/// let store = KvsBuilder::from_config(config).open("app", 3).await?;
///
/// // Tests: a private engine per test
/// let store = Kvs::builder()
///     .backend(Backend::Indexed(Arc::new(IdbFactory::new())))
///     .open("app", 1)
///     .await?;
/// ```
pub struct KvsBuilder {
    config: KvsConfig,
    backend: Option<Backend>,
    upgrade: Option<UpgradeFn<Kvs>>,
}

impl KvsBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::from_config(KvsConfig::default())
    }

    /// Create a builder from loaded settings.
    pub fn from_config(config: KvsConfig) -> Self {
        Self {
            config,
            backend: None,
            upgrade: None,
        }
    }

    /// Use the process-wide transactional engine.
    pub fn indexed(mut self) -> Self {
        self.config.backend = BackendConfig::Indexed;
        self.backend = None;
        self
    }

    /// Use the process-wide in-memory flat storage.
    pub fn memory(mut self) -> Self {
        self.config.backend = BackendConfig::Memory;
        self.backend = None;
        self
    }

    /// Use a flat storage persisted to `path`.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.backend = BackendConfig::File {
            path: path.as_ref().to_path_buf(),
        };
        self.backend = None;
        self
    }

    /// Use an explicit engine instance, overriding configured settings.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Table within the store.
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.config.table_name = table_name.into();
        self
    }

    /// Key holding the schema version in flat key spaces.
    pub fn version_key(mut self, version_key: impl Into<String>) -> Self {
        self.config.version_key = version_key.into();
        self
    }

    /// Migration run when the persisted version is lower than the
    /// requested one.
    pub fn upgrade<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(UpgradeContext<Kvs>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.upgrade = Some(upgrade_fn(f));
        self
    }

    /// Open store `name` at schema `version`.
    pub async fn open(self, name: &str, version: u64) -> Result<Kvs> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => self.config.backend.build()?,
        };
        let options = OpenOptions {
            backend,
            table_name: self.config.table_name,
            version_key: self.config.version_key,
            upgrade: self.upgrade,
        };
        Kvs::open(name, version, options).await
    }
}

impl Default for KvsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KvsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvsBuilder")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .field("upgrade", &self.upgrade.is_some())
            .finish()
    }
}
