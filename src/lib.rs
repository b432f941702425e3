//! # kvs
//!
//! Versioned key-value storage over heterogeneous engines.
//!
//! One async surface, [`KvStore`], sits over two kinds of engine:
//!
//! - a transactional object-store engine ([`IdbFactory`]) with database
//!   versions, cursors and commit-as-durability
//! - flat string key spaces ([`MemoryStorage`], [`FileStorage`]) where
//!   tables and versions are emulated with key prefixes
//!
//! Every store is opened at a schema version. When the persisted version
//! is lower, the caller's upgrade callback runs once before the handle is
//! returned.
//!
//! ## Quick Start
//!
//! ```ignore
//! use kvs::prelude::*;
//!
//! let options = OpenOptions::new()
//!     .table_name("users")
//!     .upgrade(|ctx| async move {
//!         if ctx.old_version < 2 {
//!             ctx.store.set("schema", Some(json!("v2"))).await?;
//!         }
//!         Ok::<_, anyhow::Error>(())
//!     });
//! let store = Kvs::open("app", 2, options).await?;
//!
//! store.set("alice", Some(json!({"age": 30}))).await?;
//! assert!(store.has("alice").await?);
//! store.close().await?;
//! ```
//!
//! ## Backends
//!
//! [`Backend`] picks the engine explicitly; [`KvsBuilder`] and
//! [`KvsConfig`] pick it from settings:
//!
//! ```ignore
//! let store = Kvs::builder()
//!     .file("./data/local.json")
//!     .open("app", 1)
//!     .await?;
//! ```

#![warn(missing_docs)]

mod config;
mod database;
mod error;
mod types;

pub mod prelude;

// Re-export main entry points
pub use config::{BackendConfig, ConfigError, KvsConfig};
pub use database::{Backend, Kvs, KvsBuilder, OpenOptions};
pub use error::{Error, Result};

// Re-export types
pub use types::*;
