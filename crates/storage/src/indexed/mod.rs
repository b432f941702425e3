//! Transactional object-store engine
//!
//! An in-process engine with the lifecycle of a browser object database:
//!
//! - [`IdbFactory`] opens and deletes named databases. Each database has an
//!   integer version; object stores can only be created or deleted inside a
//!   [`VersionChange`] step run while opening at a higher version.
//! - [`Connection`] is one open handle. Other openers that need a version
//!   change notify every open connection first ([`VersionChangeEvent`]);
//!   connections still open afterwards make the opener fail with
//!   [`EngineError::Blocked`](crate::EngineError::Blocked).
//! - [`Transaction`] scopes reads and writes. Read-only transactions share
//!   the database; read-write transactions and version changes are exclusive.
//!   Commit is the durability boundary; dropping an uncommitted transaction
//!   rolls it back.
//! - [`Request`] carries each operation's outcome, [`KeyRange`] positions
//!   cursor reads.
//!
//! ## Lock order
//!
//! Database data lock (async `RwLock`) first, connection registry
//! (`parking_lot::Mutex`) second. Version-change handlers run with the data
//! lock held and the registry unlocked; they must not await.

mod connection;
mod factory;
mod request;
mod transaction;

pub use connection::{Closer, Connection, VersionChange, VersionChangeEvent};
pub use factory::IdbFactory;
pub use request::{ReadyState, Request};
pub use transaction::{KeyRange, ObjectStore, Transaction, TransactionMode};

use kvs_core::Value;
use std::collections::BTreeMap;

/// Records of one object store, ordered by key.
pub(crate) type StoreData = BTreeMap<String, Value>;

/// Everything a database persists.
#[derive(Debug, Default)]
pub(crate) struct DatabaseData {
    pub(crate) version: u64,
    pub(crate) stores: BTreeMap<String, StoreData>,
    /// Set once the database is deleted; holders of the old handle retry
    pub(crate) deleted: bool,
}
