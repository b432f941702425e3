//! Engine error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the transactional engine.
///
/// Cloneable because one failure is observed both through the transaction
/// and through each of its requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Other connections stayed open after a version-change notification.
    #[error("database '{name}' is blocked by {open_connections} open connection(s)")]
    Blocked {
        /// Database name
        name: String,
        /// Connections that did not close
        open_connections: usize,
    },

    /// Open requested a version lower than the database's.
    #[error("requested version {requested} is lower than current version {current}")]
    Version {
        /// Requested version
        requested: u64,
        /// Current database version
        current: u64,
    },

    /// Versions start at 1.
    #[error("database versions start at 1")]
    InvalidVersion,

    /// Object store does not exist.
    #[error("object store '{0}' not found")]
    NotFound(String),

    /// Object store already exists.
    #[error("object store '{0}' already exists")]
    Constraint(String),

    /// Object store name is unusable.
    #[error("invalid object store name: {0:?}")]
    InvalidName(String),

    /// Operation attempted in the wrong state (closed connection, finished
    /// transaction, unsettled request).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Write attempted in a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// Transaction rolled back.
    #[error("transaction aborted: {0}")]
    Aborted(String),
}

/// Errors reported by flat storages.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file exists but is not a string map.
    #[error("corrupt storage file {path}: {message}")]
    Corrupt {
        /// File path
        path: PathBuf,
        /// Parse failure
        message: String,
    },
}

impl From<StorageError> for kvs_core::Error {
    fn from(e: StorageError) -> Self {
        kvs_core::Error::Storage(e.to_string())
    }
}
