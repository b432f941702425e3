//! Request objects
//!
//! Every object-store operation returns a [`Request`]. Reads settle as soon
//! as they are issued; writes stay pending until their transaction commits
//! or aborts. Reading the error of a pending request is an
//! [`EngineError::InvalidState`], never a silent `None`.

use crate::error::EngineError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Whether a request has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Waiting for the transaction to finish
    Pending,
    /// Settled with a result or an error
    Done,
}

#[derive(Debug)]
enum Slot<T> {
    Pending,
    Done(T),
    Failed(EngineError),
}

/// Handle to the outcome of one operation.
#[derive(Debug)]
pub struct Request<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T> Clone for Request<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Clone> Request<T> {
    pub(crate) fn pending() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Pending)),
        }
    }

    pub(crate) fn done(value: T) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Done(value))),
        }
    }

    pub(crate) fn settle(&self, value: T) {
        *self.slot.lock() = Slot::Done(value);
    }

    pub(crate) fn fail(&self, error: EngineError) {
        *self.slot.lock() = Slot::Failed(error);
    }

    /// Current ready state.
    pub fn ready_state(&self) -> ReadyState {
        match *self.slot.lock() {
            Slot::Pending => ReadyState::Pending,
            Slot::Done(_) | Slot::Failed(_) => ReadyState::Done,
        }
    }

    /// Result of a settled request.
    pub fn result(&self) -> Result<T, EngineError> {
        match &*self.slot.lock() {
            Slot::Pending => Err(EngineError::InvalidState(
                "request has not finished".into(),
            )),
            Slot::Done(value) => Ok(value.clone()),
            Slot::Failed(e) => Err(e.clone()),
        }
    }

    /// Error of a settled request, `Ok(None)` if it succeeded.
    ///
    /// Fails with [`EngineError::InvalidState`] while the request is pending.
    pub fn error(&self) -> Result<Option<EngineError>, EngineError> {
        match &*self.slot.lock() {
            Slot::Pending => Err(EngineError::InvalidState(
                "request has not finished".into(),
            )),
            Slot::Done(_) => Ok(None),
            Slot::Failed(e) => Ok(Some(e.clone())),
        }
    }
}
