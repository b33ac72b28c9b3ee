//! Compilation targets and the events they emit.
//!
//! A target only has to let the relay subscribe to "invalidated" and "done" events. The
//! in-process `TargetHandle` stores those subscriptions and is driven by the watch/build loop
//! in `build_loop`, which runs a target's configured command through `command`.

pub mod build_loop;
pub mod command;
pub mod watch;

use crate::relay::status::CompilationResult;
use std::sync::{Mutex, PoisonError};

pub type InvalidatedCallback = Box<dyn Fn() + Send + Sync>;
pub type DoneCallback = Box<dyn Fn(&CompilationResult) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Client,
    Server,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Client => write!(f, "client"),
            TargetKind::Server => write!(f, "server"),
        }
    }
}

/// A compilation pipeline the relay can subscribe to.
pub trait CompilationTarget {
    fn on_invalidated(&self, callback: InvalidatedCallback);
    fn on_done(&self, callback: DoneCallback);
}

/// Fans one target's events out to every subscribed callback.
pub struct TargetHandle {
    kind: TargetKind,
    invalidated: Mutex<Vec<InvalidatedCallback>>,
    done: Mutex<Vec<DoneCallback>>,
}

impl TargetHandle {
    pub fn new(kind: TargetKind) -> Self {
        Self {
            kind,
            invalidated: Mutex::new(Vec::new()),
            done: Mutex::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Reports that this target started compiling again.
    pub fn invalidate(&self) {
        let callbacks = self
            .invalidated
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter() {
            callback();
        }
    }

    /// Reports that this target finished compiling.
    pub fn finish(&self, result: &CompilationResult) {
        let callbacks = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter() {
            callback(result);
        }
    }
}

impl CompilationTarget for TargetHandle {
    fn on_invalidated(&self, callback: InvalidatedCallback) {
        self.invalidated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    fn on_done(&self, callback: DoneCallback) {
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }
}

#[cfg(test)]
#[path = "tests/target_tests.rs"]
mod tests;
