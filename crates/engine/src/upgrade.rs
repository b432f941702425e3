//! Version upgrade coordinator
//!
//! Every adapter persists one schema version per store identity. On open the
//! coordinator compares it with the requested version and decides:
//!
//! | persisted `P` | outcome |
//! |---|---|
//! | absent | write `0` first, then continue with `P = 0` |
//! | `P == V` | nothing to do, the callback is not called |
//! | `P > V` | [`Error::VersionDowngrade`] |
//! | `P < V` | call the callback once, then persist `V` |
//!
//! There is no chaining: a store at version 1 opened at version 3 runs the
//! callback once with `old_version = 1`. If the callback fails the version
//! stays `P`, so the next open runs it again; writes the callback already
//! made are not undone.
//!
//! Callers hold the identity's open guard for the whole check, so no
//! other open reads the version while a migration is in flight. Before the
//! callback runs, handles opened at the older version are retired.
//!
//! On any failure the store handle is released before the error is
//! returned.

use crate::registry::OpenGuard;
use async_trait::async_trait;
use kvs_core::{Error, KvStore, Result, SyncUpgradeFn, UpgradeContext, UpgradeFn};
use tracing::{debug, info, warn};

/// Where an adapter keeps the schema version of one store identity.
#[async_trait]
pub trait SchemaMeta: Send + Sync {
    /// Persisted version, `None` if the identity was never opened.
    async fn stored_version(&self) -> Result<Option<u64>>;

    /// Persist `version`.
    async fn store_version(&self, version: u64) -> Result<()>;
}

/// Synchronous counterpart of [`SchemaMeta`].
pub trait SchemaMetaSync {
    /// Persisted version, `None` if the identity was never opened.
    fn stored_version(&self) -> Result<Option<u64>>;

    /// Persist `version`.
    fn store_version(&self, version: u64) -> Result<()>;

    /// Release the handle after a failed open.
    fn release(&self);
}

/// What an open has to do about the schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradePlan {
    /// Persisted and requested versions match.
    Current,
    /// Run the callback and persist `new_version`.
    Upgrade {
        /// Persisted version
        old_version: u64,
        /// Requested version
        new_version: u64,
    },
}

/// Decide the upgrade for a persisted and a requested version.
pub fn plan(stored: u64, requested: u64) -> Result<UpgradePlan> {
    use std::cmp::Ordering;

    match stored.cmp(&requested) {
        Ordering::Equal => Ok(UpgradePlan::Current),
        Ordering::Less => Ok(UpgradePlan::Upgrade {
            old_version: stored,
            new_version: requested,
        }),
        Ordering::Greater => Err(Error::VersionDowngrade { stored, requested }),
    }
}

/// Bring `store` to `requested`, running `upgrade` at most once.
///
/// `store` is closed before any error is returned.
pub(crate) async fn run_upgrade<S>(
    store: &S,
    requested: u64,
    upgrade: Option<UpgradeFn<S>>,
    guard: &OpenGuard,
) -> Result<()>
where
    S: KvStore + SchemaMeta + Clone + 'static,
{
    let outcome = upgrade_inner(store, requested, upgrade, guard).await;
    if outcome.is_err() {
        if let Err(e) = store.close().await {
            warn!(store = %store.identity(), error = %e, "failed to close store after failed open");
        }
    }
    outcome
}

async fn upgrade_inner<S>(
    store: &S,
    requested: u64,
    upgrade: Option<UpgradeFn<S>>,
    guard: &OpenGuard,
) -> Result<()>
where
    S: KvStore + SchemaMeta + Clone + 'static,
{
    let stored = match store.stored_version().await? {
        Some(version) => version,
        None => {
            store.store_version(0).await?;
            debug!(store = %store.identity(), "created schema version marker");
            0
        }
    };

    match plan(stored, requested) {
        Ok(UpgradePlan::Current) => {
            debug!(store = %store.identity(), version = stored, "schema version is current");
            Ok(())
        }
        Ok(UpgradePlan::Upgrade {
            old_version,
            new_version,
        }) => {
            guard.retire_all();
            if let Some(upgrade) = upgrade {
                let ctx = UpgradeContext {
                    store: store.clone(),
                    old_version,
                    new_version,
                };
                if let Err(cause) = upgrade(ctx).await {
                    warn!(
                        store = %store.identity(),
                        old_version,
                        new_version,
                        error = %cause,
                        "upgrade callback failed"
                    );
                    return Err(Error::UpgradeFailed {
                        old_version,
                        new_version,
                        cause,
                    });
                }
            }
            store.store_version(new_version).await?;
            info!(store = %store.identity(), old_version, new_version, "schema upgraded");
            Ok(())
        }
        Err(e) => {
            warn!(store = %store.identity(), stored, requested, "refusing schema downgrade");
            Err(e)
        }
    }
}

/// Synchronous [`run_upgrade`].
pub(crate) fn run_upgrade_sync<S>(
    store: &S,
    requested: u64,
    upgrade: Option<SyncUpgradeFn<S>>,
    guard: &OpenGuard,
) -> Result<()>
where
    S: SchemaMetaSync + Clone,
{
    let outcome = upgrade_sync_inner(store, requested, upgrade, guard);
    if outcome.is_err() {
        store.release();
    }
    outcome
}

fn upgrade_sync_inner<S>(
    store: &S,
    requested: u64,
    upgrade: Option<SyncUpgradeFn<S>>,
    guard: &OpenGuard,
) -> Result<()>
where
    S: SchemaMetaSync + Clone,
{
    let stored = match store.stored_version()? {
        Some(version) => version,
        None => {
            store.store_version(0)?;
            0
        }
    };

    let UpgradePlan::Upgrade {
        old_version,
        new_version,
    } = plan(stored, requested)?
    else {
        return Ok(());
    };

    guard.retire_all();
    if let Some(upgrade) = upgrade {
        let ctx = UpgradeContext {
            store: store.clone(),
            old_version,
            new_version,
        };
        upgrade(ctx).map_err(|cause| Error::UpgradeFailed {
            old_version,
            new_version,
            cause,
        })?;
    }
    store.store_version(new_version)?;
    info!(old_version, new_version, "schema upgraded");
    Ok(())
}
