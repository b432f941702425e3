//! Store adapters for kvs
//!
//! This crate puts the uniform [`KvStore`](kvs_core::KvStore) contract on
//! top of the engines in `kvs-storage`:
//!
//! - [`IndexedStore`]: transactional engine, one database per store name
//! - [`FlatStore`]: flat key space, tables and versions emulated with key
//!   prefixes
//! - [`upgrade`]: the schema-version coordinator both adapters share
//! - [`iter`]: lazy entry iterators
//!
//! Opens of the same identity are serialized, and an upgrade closes the
//! handles opened at the older version.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod flat;
pub mod indexed;
pub mod iter;
mod registry;
pub mod upgrade;

pub use flat::{namespace, FlatOptions, FlatStore};
pub use indexed::{settled_error, IndexedStore};
pub use iter::{CursorEntries, CursorState, FlatEntries};
pub use upgrade::{plan, SchemaMeta, SchemaMetaSync, UpgradePlan};
