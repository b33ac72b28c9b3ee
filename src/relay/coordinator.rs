//! Reconciles client and server build events into one visible status.
//!
//! Both targets report independently and in any order. The coordinator keeps the last client
//! result around even while a server error hides it, so clearing the server error can show
//! the client result again without waiting for another client build.

use crate::event_log;
use crate::pipeline::CompilationTarget;
use crate::relay::registry::{
    BroadcastReport, Listener, ListenerId, ListenerRegistry, report_send_failure,
};
use crate::relay::status::{CompilationResult, StatusAction, StatusMessage};
use saying::say;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What listeners were last told, as a state rather than as flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VisibleStatus {
    #[default]
    Idle,
    Building,
    Built(CompilationResult),
    ServerError(CompilationResult),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorState {
    // Replayed to listeners that join later.
    pub latest: Option<CompilationResult>,
    // Survives server errors so it can be promoted once the server recovers.
    pub client_latest: Option<CompilationResult>,
    pub server_has_error: bool,
    pub closed: bool,
    pub visible: VisibleStatus,
}

pub struct BuildStatusCoordinator {
    state: Mutex<CoordinatorState>,
    registry: ListenerRegistry,
}

impl BuildStatusCoordinator {
    pub fn new(registry: ListenerRegistry) -> Self {
        Self {
            state: Mutex::new(CoordinatorState::default()),
            registry,
        }
    }

    /// Builds a coordinator that is driven by the two targets' events.
    pub fn attach(client: &dyn CompilationTarget, server: &dyn CompilationTarget) -> Arc<Self> {
        Self::attach_with_registry(ListenerRegistry::new(), client, server)
    }

    pub fn attach_with_registry(
        registry: ListenerRegistry,
        client: &dyn CompilationTarget,
        server: &dyn CompilationTarget,
    ) -> Arc<Self> {
        let coordinator = Arc::new(Self::new(registry));

        // Targets only hold weak handles, so dropping the coordinator silences them.
        let weak = Arc::downgrade(&coordinator);
        client.on_invalidated(Box::new(move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_client_invalid();
            }
        }));

        let weak = Arc::downgrade(&coordinator);
        client.on_done(Box::new(move |result| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_client_done(result);
            }
        }));

        let weak = Arc::downgrade(&coordinator);
        server.on_invalidated(Box::new(move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_server_invalid();
            }
        }));

        let weak = Arc::downgrade(&coordinator);
        server.on_done(Box::new(move |result| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_server_done(result);
            }
        }));

        coordinator
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on_client_invalid(&self) -> Option<BroadcastReport> {
        let mut state = self.lock_state();
        if state.closed || state.server_has_error {
            event_log!(Dark "Client invalidated, broadcast suppressed");
            return None;
        }

        state.latest = None;
        state.visible = VisibleStatus::Building;
        self.broadcast_status(&StatusMessage::building())
    }

    pub fn on_client_done(&self, result: &CompilationResult) -> Option<BroadcastReport> {
        let mut state = self.lock_state();
        if state.closed {
            return None;
        }

        // Recorded even while a server error masks it.
        state.client_latest = Some(result.clone());
        if state.server_has_error {
            event_log!(Dark "Client built ", result.hash.clone(), Dark " while masked");
            return None;
        }

        state.latest = Some(result.clone());
        state.visible = VisibleStatus::Built(result.clone());
        self.broadcast_status(&StatusMessage::from_result(StatusAction::Built, result))
    }

    pub fn on_server_invalid(&self) -> Option<BroadcastReport> {
        let mut state = self.lock_state();
        if state.closed || !state.server_has_error {
            return None;
        }

        state.server_has_error = false;
        event_log!(Dark "Server error cleared");

        let client_latest = state.client_latest.clone()?;
        let message = StatusMessage::from_result(StatusAction::Built, &client_latest);
        state.visible = VisibleStatus::Built(client_latest.clone());
        state.latest = Some(client_latest);
        self.broadcast_status(&message)
    }

    pub fn on_server_done(&self, result: &CompilationResult) -> Option<BroadcastReport> {
        let mut state = self.lock_state();
        if state.closed {
            return None;
        }

        state.server_has_error = result.has_errors;
        if !state.server_has_error {
            // The client's own `done` drives the next visible status.
            return None;
        }

        state.latest = Some(result.clone());
        state.visible = VisibleStatus::ServerError(result.clone());
        self.broadcast_status(&StatusMessage::from_result(StatusAction::Built, result))
    }

    /// Registers a new listener and catches it up with the current status, if there is one.
    pub fn on_listener_join(&self, listener: Arc<dyn Listener>) -> Option<ListenerId> {
        let state = self.lock_state();
        if state.closed {
            return None;
        }

        let listener_id = self.registry.add(Arc::clone(&listener));
        let Some(latest) = state.latest.as_ref() else {
            return Some(listener_id);
        };

        match StatusMessage::from_result(StatusAction::Sync, latest).to_json() {
            Ok(payload) => {
                if let Err(error) = listener.send(&payload) {
                    report_send_failure(listener_id, &error);
                }
            }
            Err(error) => {
                say!(Yellow "Failed to serialize sync status: ", error.to_string());
            }
        }

        Some(listener_id)
    }

    /// Forwards an arbitrary payload to every listener, unchanged.
    pub fn publish<T: Serialize + ?Sized>(&self, payload: &T) -> Option<BroadcastReport> {
        match serde_json::to_string(payload) {
            Ok(serialized) => self.publish_raw(&serialized),
            Err(error) => {
                say!(Yellow "Failed to serialize published payload: ", error.to_string());
                None
            }
        }
    }

    pub fn publish_raw(&self, payload: &str) -> Option<BroadcastReport> {
        let state = self.lock_state();
        if state.closed {
            return None;
        }

        Some(self.registry.broadcast(payload))
    }

    /// Closes every listener and turns all later calls into no-ops. Safe to call twice.
    pub fn shutdown(&self) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }

        state.closed = true;
        self.registry.close_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    pub fn snapshot(&self) -> CoordinatorState {
        self.lock_state().clone()
    }

    pub fn visible_status(&self) -> VisibleStatus {
        self.lock_state().visible.clone()
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    // Callers hold the state lock, which keeps per-listener delivery in event order.
    fn broadcast_status(&self, message: &StatusMessage) -> Option<BroadcastReport> {
        match message.to_json() {
            Ok(payload) => {
                event_log!(Green "Broadcast ", message.action.to_string());
                Some(self.registry.broadcast(&payload))
            }
            Err(error) => {
                say!(Yellow "Failed to serialize build status: ", error.to_string());
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
