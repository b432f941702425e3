//! Configuration for opening stores.
//!
//! Settings can come from code or from a TOML file:
//!
//! ```toml
//! table_name = "users"
//! version_key = "__kvs_version__"
//!
//! [backend]
//! type = "file"
//! path = "./data/local.json"
//! ```
//!
//! Every field is optional; missing ones take the defaults of
//! [`KvsConfig::default`].

use crate::database::Backend;
use crate::error::{Error, Result};
use kvs_core::{DEFAULT_TABLE_NAME, DEFAULT_VERSION_KEY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Settings are not valid TOML or have the wrong shape
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}

/// Which engine to use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// The process-wide transactional engine
    #[default]
    Indexed,
    /// The process-wide in-memory flat storage
    Memory,
    /// A flat storage persisted to a JSON file
    File {
        /// File path
        path: PathBuf,
    },
}

impl BackendConfig {
    /// Resolve to an engine instance.
    pub fn build(&self) -> Result<Backend> {
        match self {
            BackendConfig::Indexed => Ok(Backend::indexed()),
            BackendConfig::Memory => Ok(Backend::memory()),
            BackendConfig::File { path } => Backend::file(path),
        }
    }
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvsConfig {
    /// Engine
    pub backend: BackendConfig,
    /// Table within the store
    pub table_name: String,
    /// Key holding the schema version in flat key spaces
    pub version_key: String,
}

impl Default for KvsConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            version_key: DEFAULT_VERSION_KEY.to_string(),
        }
    }
}

impl KvsConfig {
    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
