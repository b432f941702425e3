//! Error types for kvs.
//!
//! Every backend reports through the one [`Error`] enum defined in
//! `kvs-core`; configuration problems are [`ConfigError`](crate::ConfigError)
//! and convert into [`Error::InvalidArgument`].

pub use kvs_core::{Error, Result};
