//! Open coordination per store identity
//!
//! Opens of one identity on one engine hold an exclusive [`OpenGuard`] for
//! the whole version check: reading the persisted version, running the
//! migration and writing the new version. A concurrent opener waits for the
//! guard and then sees the version the first one wrote, so a migration runs
//! once however many openers race for it.
//!
//! Open handles are registered under their identity. An upgrade retires
//! every handle registered before it, before its callback runs, so no handle
//! keeps reading or writing data that was migrated underneath it. Retired
//! handles fail with [`Error::Closed`].
//!
//! A migration callback must not open its own identity again: that open
//! would wait for the guard held by the open running the callback.

use dashmap::DashMap;
use kvs_core::{Error, Result, StoreIdentity};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::info;

/// A store handle an upgrade can shut down.
pub(crate) trait Retire: Send + Sync {
    /// Close the handle; later operations fail with [`Error::Closed`].
    fn retire(&self);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    engine: usize,
    identity: StoreIdentity,
}

#[derive(Default)]
struct Slot {
    gate: Arc<AsyncMutex<()>>,
    handles: Mutex<Vec<Weak<dyn Retire>>>,
}

impl Slot {
    fn has_live_handles(&self) -> bool {
        self.handles.lock().iter().any(|h| h.strong_count() > 0)
    }
}

static SLOTS: Lazy<DashMap<SlotKey, Arc<Slot>>> = Lazy::new(DashMap::new);

/// Identify an engine instance by address.
///
/// Registered handles keep their engine alive, so an address is not reused
/// while live handles are filed under it.
pub(crate) fn engine_id<T: ?Sized>(engine: &Arc<T>) -> usize {
    Arc::as_ptr(engine) as *const () as usize
}

/// Exclusive right to check and migrate the schema version of one identity.
pub(crate) struct OpenGuard {
    key: SlotKey,
    slot: Arc<Slot>,
    _gate: OwnedMutexGuard<()>,
}

impl OpenGuard {
    fn slot(engine: usize, identity: &StoreIdentity) -> (SlotKey, Arc<Slot>) {
        let key = SlotKey {
            engine,
            identity: identity.clone(),
        };
        let slot = Arc::clone(SLOTS.entry(key.clone()).or_default().value());
        (key, slot)
    }

    /// Wait until no other open of `identity` on `engine` is in progress.
    pub(crate) async fn acquire(engine: usize, identity: &StoreIdentity) -> Self {
        let (key, slot) = Self::slot(engine, identity);
        let gate = Arc::clone(&slot.gate).lock_owned().await;
        Self {
            key,
            slot,
            _gate: gate,
        }
    }

    /// Take the guard without waiting; an open already in progress is
    /// reported as [`Error::OpenBlocked`].
    pub(crate) fn try_acquire(engine: usize, identity: &StoreIdentity) -> Result<Self> {
        let (key, slot) = Self::slot(engine, identity);
        let gate = Arc::clone(&slot.gate).try_lock_owned().map_err(|_| {
            Error::OpenBlocked(format!("store '{}' is being opened elsewhere", identity))
        })?;
        Ok(Self {
            key,
            slot,
            _gate: gate,
        })
    }

    /// Track `handle` until it is dropped.
    pub(crate) fn register(&self, handle: Weak<dyn Retire>) {
        let mut handles = self.slot.handles.lock();
        handles.retain(|h| h.strong_count() > 0);
        handles.push(handle);
    }

    /// Retire every registered handle. Returns how many were still alive.
    pub(crate) fn retire_all(&self) -> usize {
        let live: Vec<Arc<dyn Retire>> = self
            .slot
            .handles
            .lock()
            .drain(..)
            .filter_map(|h| h.upgrade())
            .collect();
        for handle in &live {
            handle.retire();
        }
        if !live.is_empty() {
            info!(
                store = %self.key.identity,
                handles = live.len(),
                "retired handles opened at an older version"
            );
        }
        live.len()
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        // Two owners left means the map and this guard: nobody else is opening
        SLOTS.remove_if(&self.key, |_, slot| {
            Arc::strong_count(slot) == 2 && !slot.has_live_handles()
        });
    }
}
