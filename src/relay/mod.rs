//! Build status relay core: the listener registry and the coordinator that drives it.

pub mod coordinator;
pub mod registry;
pub mod status;

pub use coordinator::{BuildStatusCoordinator, CoordinatorState, VisibleStatus};
pub use registry::{BroadcastReport, Listener, ListenerId, ListenerRegistry, ListenerSendError};
pub use status::{CompilationResult, StatusAction, StatusMessage};
