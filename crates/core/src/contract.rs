//! The uniform store contract.
//!
//! ## Absent values
//!
//! `None` is the absent sentinel: `set(key, None)` behaves exactly like
//! `delete(key)` on every backend. `Some(Value::Null)` is a real value.
//!
//! ## Upgrade callbacks
//!
//! A store is opened at a caller-chosen schema version. When the persisted
//! version differs, the caller's [`UpgradeFn`] runs once with an
//! [`UpgradeContext`] whose `store` is bound to the same container the
//! opened handle will use. Migrations across several versions are the
//! caller's job:
//!
//! ```ignore
//! let options = OpenOptions::new().upgrade(|ctx| async move {
//!     if ctx.old_version <= 1 {
//!         ctx.store.set("v1", Some(json!("migrated"))).await?;
//!     }
//!     if ctx.old_version <= 2 {
//!         ctx.store.set("v2", Some(json!("migrated"))).await?;
//!     }
//!     Ok::<_, anyhow::Error>(())
//! });
//! ```

use crate::codec;
use crate::error::Result;
use crate::identity::StoreIdentity;
use crate::Value;
use async_trait::async_trait;
use futures_core::stream::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stored entry.
pub type Entry = (String, Value);

/// Lazy, forward-only sequence of entries.
pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = Result<Entry>> + Send + 'a>>;

/// Uniform async store surface implemented by every backend.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Identity this handle was opened with.
    fn identity(&self) -> &StoreIdentity;

    /// Read a value. A missing key is `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, or delete the key when `value` is `None`.
    ///
    /// Resolves once the write is durable and returns the handle so calls
    /// can be chained.
    async fn set(&self, key: &str, value: Option<Value>) -> Result<&Self>;

    /// Whether a value is stored under `key`.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Remove a key. Returns `true` whether or not the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every entry; the schema version is kept.
    async fn clear(&self) -> Result<()>;

    /// Remove all data and metadata, then release the handle.
    async fn drop_instance(&self) -> Result<()>;

    /// Release the connection. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Scan every entry once.
    ///
    /// Order is backend-defined. The stream holds no strong reference to
    /// the store and fails with `Error::Closed` once the store is closed.
    fn entries(&self) -> EntryStream<'static>;
}

/// Typed helpers on top of [`KvStore`].
#[async_trait]
pub trait KvStoreExt: KvStore {
    /// Read and deserialize a value.
    async fn get_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(value) => Ok(Some(codec::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize and write a value.
    async fn set_as<T>(&self, key: &str, value: &T) -> Result<&Self>
    where
        T: Serialize + Sync + ?Sized,
    {
        let value = codec::to_value(value)?;
        self.set(key, Some(value)).await
    }
}

impl<S: KvStore> KvStoreExt for S {}

/// What a migration callback receives.
pub struct UpgradeContext<S> {
    /// Handle bound to the container being opened
    pub store: S,
    /// Persisted version before this open; `0` on first open
    pub old_version: u64,
    /// Version requested by the caller
    pub new_version: u64,
}

/// Async migration callback, called at most once per open.
pub type UpgradeFn<S> =
    Box<dyn FnOnce(UpgradeContext<S>) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Synchronous migration callback for the flat backend's sync surface.
pub type SyncUpgradeFn<S> = Box<dyn FnOnce(UpgradeContext<S>) -> anyhow::Result<()> + Send>;

/// Box an async closure into an [`UpgradeFn`].
pub fn upgrade_fn<S, F, Fut>(f: F) -> UpgradeFn<S>
where
    F: FnOnce(UpgradeContext<S>) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move |ctx| Box::pin(f(ctx)))
}
