//! Public types re-exported from the internal crates.

// Contract
pub use kvs_core::{
    upgrade_fn, BoxFuture, Entry, EntryStream, KvStore, KvStoreExt, StoreIdentity,
    SyncUpgradeFn, UpgradeContext, UpgradeFn, Value,
};

// Reserved names and defaults
pub use kvs_core::{DEFAULT_TABLE_NAME, DEFAULT_VERSION_KEY, META_STORE_NAME, TABLE_KEY_MARKER};

// Engines
pub use kvs_storage::{FileStorage, FlatStorage, IdbFactory, MemoryStorage};

// Adapters
pub use kvs_engine::{CursorEntries, CursorState, FlatEntries, FlatOptions, FlatStore, IndexedStore};
