//! Relay server entry point and orchestration.
//!
//! Builds the coordinator from the two target handles, starts a watch/build thread per
//! target, and serves HTTP/SSE traffic until Ctrl-C shuts everything down.

mod client_script;
mod http;
mod sse;

pub use sse::{SseListener, format_sse_frame};

use crate::pipeline::build_loop::{self, WatchSettings};
use crate::pipeline::command::{BuildExecutor, CommandTarget};
use crate::pipeline::{TargetHandle, TargetKind};
use crate::relay::coordinator::BuildStatusCoordinator;
use crate::relay_messages::relay_errors::{RelayError, RelayMessages};
use crate::settings::{Config, EVENTS_ROUTE, TargetConfig};
use saying::say;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Accepts connections and hands each one to a worker thread.
pub struct RelayServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    coordinator: Arc<BuildStatusCoordinator>,
    stop: Arc<AtomicBool>,
}

/// Stops a running `RelayServer` from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    coordinator: Arc<BuildStatusCoordinator>,
    stop: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }

        self.coordinator.shutdown();

        // The accept loop only checks the stop flag between connections.
        let _ = TcpStream::connect(self.wake_addr);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }
}

impl RelayServer {
    pub fn new(
        listener: TcpListener,
        client: &TargetHandle,
        server: &TargetHandle,
    ) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            coordinator: BuildStatusCoordinator::attach(client, server),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn coordinator(&self) -> Arc<BuildStatusCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        let mut wake_addr = self.local_addr;
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip([127, 0, 0, 1].into());
        }

        ShutdownHandle {
            coordinator: Arc::clone(&self.coordinator),
            stop: Arc::clone(&self.stop),
            wake_addr,
        }
    }

    /// Serves connections until the shutdown handle fires.
    pub fn serve(self) {
        for stream_result in self.listener.incoming() {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            match stream_result {
                Ok(stream) => {
                    let coordinator = Arc::clone(&self.coordinator);
                    thread::spawn(move || {
                        if let Err(error) = http::handle_connection(stream, coordinator) {
                            say!(
                                Yellow "Relay request handling warning: ",
                                Yellow error.to_string()
                            );
                        }
                    });
                }
                Err(error) => {
                    say!(
                        Yellow "Relay connection accept warning: ",
                        Yellow error.to_string()
                    );
                }
            }
        }
    }
}

pub fn run_relay_server(config: &Config) -> Result<(), RelayMessages> {
    let (Some(client_config), Some(server_config)) = (&config.client, &config.server) else {
        return Err(RelayMessages::from_error(RelayError::dev_server_error(
            "Both [client] and [server] targets must be configured to serve.",
        )));
    };

    let bind_addr = config.bind_address();
    let listener = TcpListener::bind(&bind_addr).map_err(|error| {
        RelayError::dev_server_error(format!("Failed to start relay on {bind_addr}: {error}"))
    })?;

    let client = Arc::new(TargetHandle::new(TargetKind::Client));
    let server = Arc::new(TargetHandle::new(TargetKind::Server));
    let relay = RelayServer::new(listener, &client, &server).map_err(|error| {
        RelayError::dev_server_error(format!("Failed to read relay address: {error}"))
    })?;

    let shutdown = relay.shutdown_handle();
    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        say!(Yellow "Shutting down relay...");
        ctrlc_shutdown.shutdown();
    })
    .map_err(|error| {
        RelayError::dev_server_error(format!("Failed to install Ctrl-C handler: {error}"))
    })?;

    let host_display = if config.host == "127.0.0.1" {
        "localhost"
    } else {
        config.host.as_str()
    };
    say!(Bold "Build status relay listening at:");
    say!(
        Green "http://",
        Green host_display,
        Green ":",
        Green relay.local_addr().port(),
        Green EVENTS_ROUTE
    );

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let watchers = [
        spawn_target_loop(client, client_config, &config.project_root, poll_interval, &shutdown),
        spawn_target_loop(server, server_config, &config.project_root, poll_interval, &shutdown),
    ];

    relay.serve();

    for watcher in watchers {
        if watcher.join().is_err() {
            say!(Yellow "A target watch loop panicked during shutdown.");
        }
    }

    Ok(())
}

// Watch/rebuild runs independently from request handling so SSE clients do not block rebuilds.
fn spawn_target_loop(
    target: Arc<TargetHandle>,
    target_config: &TargetConfig,
    project_root: &Path,
    poll_interval: Duration,
    shutdown: &ShutdownHandle,
) -> JoinHandle<()> {
    let command = CommandTarget::from_config(target.kind(), target_config, project_root);
    let settings: WatchSettings = build_loop::watch_settings_for(
        &target_config.watch_root(project_root),
        command.output_dir.clone(),
        poll_interval,
    );
    let executor: Box<dyn BuildExecutor> = Box::new(command);
    let stop = shutdown.stop_flag();

    thread::spawn(move || build_loop::run_watch_build_loop(target, executor, settings, stop))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
