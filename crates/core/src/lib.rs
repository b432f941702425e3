//! Core types for kvs
//!
//! This crate defines what every storage backend agrees on:
//! - [`KvStore`]: the uniform async store contract
//! - [`StoreIdentity`]: `(name, table_name)` addressing of one key space
//! - [`UpgradeContext`]: what a migration callback receives on open
//! - [`Error`]: the error taxonomy surfaced to callers
//! - [`codec`]: text encoding of values for engines that store strings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod contract;
pub mod error;
pub mod identity;

pub use contract::{
    upgrade_fn, BoxFuture, Entry, EntryStream, KvStore, KvStoreExt, SyncUpgradeFn,
    UpgradeContext, UpgradeFn,
};
pub use error::{Error, Result};
pub use identity::{
    validate_version, StoreIdentity, DEFAULT_TABLE_NAME, DEFAULT_VERSION_KEY, META_STORE_NAME,
    TABLE_KEY_MARKER,
};

/// Values stored by kvs: any JSON-compatible value.
pub type Value = serde_json::Value;
