//! The set of connected listeners and fan-out delivery to them.
//!
//! The registry knows nothing about builds. It stores listeners under monotonic ids, removes a
//! listener when its transport reports the connection closed, and delivers one serialized
//! payload to every listener it currently holds.

use crate::event_log;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

pub type ListenerId = u64;

pub type CloseCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerSendError {
    Closed,
    Transport(String),
}

impl std::fmt::Display for ListenerSendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerSendError::Closed => write!(f, "listener connection is closed"),
            ListenerSendError::Transport(reason) => write!(f, "transport error: {reason}"),
        }
    }
}

/// One connected consumer, as seen through its transport.
///
/// `send` must not block on network I/O. `on_close` callbacks run once when the connection
/// closes, and immediately if it is already closed when the callback is registered.
pub trait Listener: Send + Sync {
    fn send(&self, payload: &str) -> Result<(), ListenerSendError>;
    fn close(&self);
    fn on_close(&self, callback: CloseCallback);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

struct RegistryInner {
    listeners: Mutex<FxHashMap<ListenerId, Arc<dyn Listener>>>,
    // IDs are monotonic so a late close notification can never remove a newer listener.
    next_listener_id: AtomicU64,
}

impl RegistryInner {
    fn lock_listeners(&self) -> MutexGuard<'_, FxHashMap<ListenerId, Arc<dyn Listener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, listener_id: ListenerId) -> bool {
        let removed = self.lock_listeners().remove(&listener_id).is_some();
        if removed {
            event_log!(Dark "Listener ", listener_id, Dark " disconnected");
        }
        removed
    }
}

#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                listeners: Mutex::new(FxHashMap::default()),
                next_listener_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers a listener and arranges for it to be dropped when its connection closes.
    pub fn add(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let listener_id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock_listeners()
            .insert(listener_id, Arc::clone(&listener));

        // Registered outside the lock: an already-closed transport runs the callback inline.
        let registry: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        listener.on_close(Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(listener_id);
            }
        }));

        event_log!(Dark "Listener ", listener_id, Dark " connected");
        listener_id
    }

    pub fn remove(&self, listener_id: ListenerId) -> bool {
        self.inner.remove(listener_id)
    }

    /// Sends `payload` to every registered listener. One failing listener never stops
    /// delivery to the others, and failures are not retried.
    pub fn broadcast(&self, payload: &str) -> BroadcastReport {
        let listeners: Vec<(ListenerId, Arc<dyn Listener>)> = self
            .inner
            .lock_listeners()
            .iter()
            .map(|(listener_id, listener)| (*listener_id, Arc::clone(listener)))
            .collect();

        let failed = listeners
            .par_iter()
            .filter(|(listener_id, listener)| match listener.send(payload) {
                Ok(()) => false,
                Err(error) => {
                    report_send_failure(*listener_id, &error);
                    true
                }
            })
            .count();

        BroadcastReport {
            delivered: listeners.len() - failed,
            failed,
        }
    }

    /// Closes every listener and empties the set. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.inner.lock_listeners());

        // Close callbacks call back into `remove`, so the lock must already be released.
        for listener in drained.values() {
            listener.close();
        }

        event_log!(Dark "Closed ", drained.len(), Dark " listeners");
        drained.len()
    }

    pub fn contains(&self, listener_id: ListenerId) -> bool {
        self.inner.lock_listeners().contains_key(&listener_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock_listeners().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(unused_variables)]
pub(crate) fn report_send_failure(listener_id: ListenerId, error: &ListenerSendError) {
    event_log!(Yellow "Send to listener ", listener_id, Yellow " failed: ", error.to_string());
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
