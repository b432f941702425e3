//! Database registry: open, upgrade and delete named databases.

use super::connection::{Connection, Database, VersionChange, VersionChangeEvent};
use crate::error::EngineError;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

static GLOBAL: Lazy<Arc<IdbFactory>> = Lazy::new(|| Arc::new(IdbFactory::new()));

/// Registry of named databases.
///
/// Databases live as long as the factory. [`IdbFactory::global`] is the
/// process-wide instance; tests create private ones with
/// [`IdbFactory::new`].
#[derive(Default)]
pub struct IdbFactory {
    databases: DashMap<String, Arc<Database>>,
    next_connection: AtomicU64,
}

impl IdbFactory {
    /// Create an empty, private factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide factory.
    pub fn global() -> Arc<IdbFactory> {
        Arc::clone(&GLOBAL)
    }

    /// Open `name`, creating it if missing.
    ///
    /// `version` of `None` opens at the current version (1 for a new
    /// database). When the target is above the current version, every open
    /// connection is sent a [`VersionChangeEvent`]; if any stay open the
    /// call fails with [`EngineError::Blocked`]. Otherwise `upgrade` runs
    /// once with exclusive access. A failing `upgrade` leaves the database
    /// untouched, and a database it was creating does not come into being.
    pub async fn open<F>(
        &self,
        name: &str,
        version: Option<u64>,
        upgrade: F,
    ) -> Result<Connection, EngineError>
    where
        F: FnOnce(&mut VersionChange) -> Result<(), EngineError>,
    {
        if version == Some(0) {
            return Err(EngineError::InvalidVersion);
        }
        loop {
            let database = self
                .databases
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Database::new(name)))
                .value()
                .clone();
            let mut data = database.data.write().await;
            if data.deleted {
                // Deleted while we waited; the registry already holds a fresh entry
                continue;
            }

            let current = data.version;
            let target = version.unwrap_or_else(|| current.max(1));
            if target < current {
                return Err(EngineError::Version {
                    requested: target,
                    current,
                });
            }

            if target > current {
                database.notify_version_change(&VersionChangeEvent {
                    old_version: current,
                    new_version: Some(target),
                });
                let open_connections = database.open_connections();
                if open_connections > 0 {
                    warn!(database = name, open_connections, "version change blocked");
                    return Err(EngineError::Blocked {
                        name: name.to_string(),
                        open_connections,
                    });
                }

                let mut change =
                    VersionChange::new(current, target, data.stores.keys().cloned().collect());
                if let Err(e) = upgrade(&mut change) {
                    warn!(
                        database = name,
                        old_version = current,
                        new_version = target,
                        error = %e,
                        "version change failed"
                    );
                    if current == 0 {
                        self.databases
                            .remove_if(name, |_, entry| Arc::ptr_eq(entry, &database));
                        data.deleted = true;
                    }
                    return Err(e);
                }
                change.apply(&mut data);
                info!(
                    database = name,
                    old_version = current,
                    new_version = target,
                    "database version changed"
                );
            }

            let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
            let store_names = data.stores.keys().cloned().collect();
            debug!(database = name, connection = id, version = data.version, "connection opened");
            return Ok(database.register(id, data.version, store_names));
        }
    }

    /// Delete `name` and everything in it. Deleting a missing database
    /// succeeds.
    ///
    /// Open connections are notified with `new_version: None` first; any
    /// left open make the call fail with [`EngineError::Blocked`].
    pub async fn delete_database(&self, name: &str) -> Result<(), EngineError> {
        let Some(database) = self.databases.get(name).map(|entry| entry.value().clone()) else {
            return Ok(());
        };
        let mut data = database.data.write().await;
        if data.deleted {
            return Ok(());
        }

        database.notify_version_change(&VersionChangeEvent {
            old_version: data.version,
            new_version: None,
        });
        let open_connections = database.open_connections();
        if open_connections > 0 {
            warn!(database = name, open_connections, "delete blocked");
            return Err(EngineError::Blocked {
                name: name.to_string(),
                open_connections,
            });
        }

        self.databases
            .remove_if(name, |_, entry| Arc::ptr_eq(entry, &database));
        data.deleted = true;
        data.stores.clear();
        info!(database = name, "database deleted");
        Ok(())
    }

    /// Names and versions of existing databases, sorted by name.
    pub async fn databases(&self) -> Vec<(String, u64)> {
        let handles: Vec<Arc<Database>> = self
            .databases
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut out = Vec::with_capacity(handles.len());
        for database in handles {
            let data = database.data.read().await;
            if !data.deleted && data.version > 0 {
                out.push((database.name.clone(), data.version));
            }
        }
        out.sort();
        out
    }
}

impl std::fmt::Debug for IdbFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdbFactory")
            .field("databases", &self.databases.len())
            .finish()
    }
}
