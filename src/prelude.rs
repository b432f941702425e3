//! Convenient imports for kvs.
//!
//! ```ignore
//! use kvs::prelude::*;
//!
//! let store = Kvs::open("app", 1, OpenOptions::new()).await?;
//! store.set("key", Some(json!("value"))).await?;
//! ```

// Main entry point
pub use crate::database::{Backend, Kvs, KvsBuilder, OpenOptions};

// Configuration
pub use crate::config::KvsConfig;

// Error handling
pub use crate::error::{Error, Result};

// Contract
pub use crate::types::{KvStore, KvStoreExt, UpgradeContext, Value};

// Re-export serde_json for convenience
pub use serde_json::json;
