//! Error types for kvs stores.
//!
//! Every backend reports failures through this one enum so that callers
//! see the same taxonomy whichever engine sits underneath.

use thiserror::Error;

/// All kvs errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Another connection prevents a version change or a deletion.
    ///
    /// Nothing was changed; the caller may retry once the other connection
    /// has closed.
    #[error("open blocked: {0}")]
    OpenBlocked(String),

    /// The engine refused to open the store or create its container.
    #[error("open failed: {0}")]
    OpenFailed(String),

    /// A transaction did not commit; none of its writes are durable.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// The caller-supplied migration callback returned an error.
    #[error("upgrade from version {old_version} to {new_version} failed: {cause:#}")]
    UpgradeFailed {
        /// Persisted version when the callback ran
        old_version: u64,
        /// Requested version
        new_version: u64,
        /// Error returned by the callback
        cause: anyhow::Error,
    },

    /// Malformed name, table name, key or version, rejected before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested version is lower than the persisted one.
    #[error("version downgrade: stored version is {stored}, requested {requested}")]
    VersionDowngrade {
        /// Persisted version
        stored: u64,
        /// Requested version
        requested: u64,
    },

    /// The store handle was closed or dropped.
    #[error("store is closed")]
    Closed,

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The underlying flat storage failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type for kvs operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Only blocked opens are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::OpenBlocked(_))
    }

    /// Check if the store was already closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }

    /// Check if this error came from the caller's migration callback.
    pub fn is_upgrade_failure(&self) -> bool {
        matches!(self, Error::UpgradeFailed { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
