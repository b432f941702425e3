//! Store identity and reserved names.
//!
//! A store is addressed by `(name, table_name)`. `name` picks the logical
//! database; `table_name` picks one key space inside it.

use crate::error::{Error, Result};
use std::fmt;

/// Table used when the caller does not name one.
pub const DEFAULT_TABLE_NAME: &str = "kvs";

/// Separator between namespace and key in flat key spaces.
pub const TABLE_KEY_MARKER: &str = ".__.";

/// Key holding the schema version in flat key spaces.
pub const DEFAULT_VERSION_KEY: &str = "__kvs_version__";

/// Object store holding per-table schema versions in transactional engines.
pub const META_STORE_NAME: &str = "__kvs_meta__";

/// Identity of one logical key space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreIdentity {
    name: String,
    table_name: String,
}

impl StoreIdentity {
    /// Create an identity, rejecting empty names.
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let table_name = table_name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("store name must not be empty".into()));
        }
        if table_name.is_empty() {
            return Err(Error::InvalidArgument("table name must not be empty".into()));
        }
        Ok(Self { name, table_name })
    }

    /// Identity using [`DEFAULT_TABLE_NAME`].
    pub fn with_default_table(name: impl Into<String>) -> Result<Self> {
        Self::new(name, DEFAULT_TABLE_NAME)
    }

    /// Logical database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key space within the database.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Whether the table is the default one.
    pub fn is_default_table(&self) -> bool {
        self.table_name == DEFAULT_TABLE_NAME
    }
}

impl fmt::Display for StoreIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.table_name)
    }
}

/// Reject schema versions below 1.
pub fn validate_version(version: u64) -> Result<()> {
    if version == 0 {
        return Err(Error::InvalidArgument(
            "schema version must be a positive integer".into(),
        ));
    }
    Ok(())
}
