//! Lazy entry iteration
//!
//! ## CursorEntries
//!
//! Walks a transactional table one record per step. Each step opens its own
//! short read-only transaction and asks for the first record after the last
//! key seen, so no transaction stays open between steps and writers are
//! never held up by an idle iterator.
//!
//! ```text
//! Idle --step--> Positioned(k) --step--> Positioned(k') ... --step--> Exhausted
//!   \______________________________________________________________/
//!                      (no record left, or an error)
//! ```
//!
//! ## FlatEntries
//!
//! Snapshots the matching keys of a flat key space when created and reads
//! each value only when it is reached. Keys removed in the meantime are
//! skipped. It is a plain blocking [`Iterator`]; the async surface wraps it
//! with `futures_util::stream::iter`.
//!
//! Both hold a weak reference to their store and fail with
//! [`Error::Closed`] once it is closed or dropped. After yielding an error
//! they are exhausted.

use crate::flat::FlatInner;
use crate::indexed::IndexedInner;
use futures_core::stream::Stream;
use kvs_core::{BoxFuture, Entry, Error, Result};
use kvs_storage::KeyRange;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

/// Position of a [`CursorEntries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// No step taken yet
    Idle,
    /// Last key yielded
    Positioned(String),
    /// Nothing more to yield
    Exhausted,
}

/// Async, forward-only iterator over a transactional table.
pub struct CursorEntries {
    source: Weak<IndexedInner>,
    state: CursorState,
    in_flight: Option<BoxFuture<'static, Result<Option<Entry>>>>,
}

impl CursorEntries {
    pub(crate) fn new(source: Weak<IndexedInner>) -> Self {
        Self {
            source,
            state: CursorState::Idle,
            in_flight: None,
        }
    }

    /// Current position.
    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Advance one record. `Ok(None)` once exhausted.
    pub async fn step(&mut self) -> Result<Option<Entry>> {
        let Some(range) = self.next_range() else {
            return Ok(None);
        };
        let fetched = match self.in_flight.take() {
            // A poll_next was interrupted mid-step; finish that step
            Some(pending) => pending.await,
            None => fetch(self.source.clone(), range).await,
        };
        self.advance(fetched)
    }

    fn next_range(&self) -> Option<KeyRange> {
        match &self.state {
            CursorState::Idle => Some(KeyRange::All),
            CursorState::Positioned(key) => Some(KeyRange::After(key.clone())),
            CursorState::Exhausted => None,
        }
    }

    fn advance(&mut self, fetched: Result<Option<Entry>>) -> Result<Option<Entry>> {
        match fetched {
            Ok(Some((key, value))) => {
                self.state = CursorState::Positioned(key.clone());
                Ok(Some((key, value)))
            }
            Ok(None) => {
                self.state = CursorState::Exhausted;
                Ok(None)
            }
            Err(e) => {
                self.state = CursorState::Exhausted;
                Err(e)
            }
        }
    }
}

async fn fetch(source: Weak<IndexedInner>, range: KeyRange) -> Result<Option<Entry>> {
    let inner = source.upgrade().ok_or(Error::Closed)?;
    inner.read_cursor(range).await
}

impl Stream for CursorEntries {
    type Item = Result<Entry>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.in_flight.is_none() {
            let Some(range) = this.next_range() else {
                return Poll::Ready(None);
            };
            this.in_flight = Some(Box::pin(fetch(this.source.clone(), range)));
        }
        let Some(pending) = this.in_flight.as_mut() else {
            return Poll::Ready(None);
        };
        match pending.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(fetched) => {
                this.in_flight = None;
                Poll::Ready(this.advance(fetched).transpose())
            }
        }
    }
}

impl std::fmt::Debug for CursorEntries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorEntries")
            .field("state", &self.state)
            .field("in_flight", &self.in_flight.is_some())
            .finish()
    }
}

/// Forward-only iterator over a flat namespace.
#[derive(Debug)]
pub struct FlatEntries {
    source: Weak<FlatInner>,
    keys: std::vec::IntoIter<String>,
}

impl FlatEntries {
    pub(crate) fn new(source: Weak<FlatInner>, keys: Vec<String>) -> Self {
        Self {
            source,
            keys: keys.into_iter(),
        }
    }

    fn exhaust(&mut self) {
        self.keys = Vec::new().into_iter();
    }
}

impl Iterator for FlatEntries {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            let inner = match self.source.upgrade() {
                Some(inner) if !inner.is_closed() => inner,
                _ => {
                    self.exhaust();
                    return Some(Err(Error::Closed));
                }
            };
            match inner.read(&key) {
                Ok(Some(value)) => return Some(Ok((inner.user_key(&key).to_string(), value))),
                Ok(None) => continue,
                Err(e) => {
                    self.exhaust();
                    return Some(Err(e));
                }
            }
        }
    }
}
