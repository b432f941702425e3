//! Storage engines for kvs
//!
//! This crate implements the two kinds of engine the store adapters sit on:
//! - [`indexed`]: a transactional object-store engine with database
//!   versions, version-change steps, request objects and key-ordered cursors
//! - [`flat`]: synchronous, engine-global string key spaces
//!   ([`MemoryStorage`], [`FileStorage`])
//!
//! Neither engine knows about schema versions of user data or about table
//! prefixes; that is the adapters' job in `kvs-engine`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flat;
pub mod indexed;

pub use error::{EngineError, StorageError};
pub use flat::{FileStorage, FlatStorage, MemoryStorage};
pub use indexed::{
    Closer, Connection, IdbFactory, KeyRange, ObjectStore, ReadyState, Request, Transaction,
    TransactionMode, VersionChange, VersionChangeEvent,
};
