//! Server-Sent Events transport for relay listeners.
//!
//! Each connected browser gets an `SseListener` registered with the coordinator. Payloads go
//! through a channel to a writer loop that owns the socket, so a slow client never holds up a
//! broadcast.

use crate::event_log;
use crate::relay::coordinator::BuildStatusCoordinator;
use crate::relay::registry::{CloseCallback, Listener, ListenerSendError};
use std::io::{self, Write};
use std::mem;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
pub const KEEP_ALIVE_FRAME: &str = ": keep-alive\n\n";

struct SseListenerState {
    sender: Option<Sender<String>>,
    close_callbacks: Vec<CloseCallback>,
    closed: bool,
}

pub struct SseListener {
    state: Mutex<SseListenerState>,
}

impl SseListener {
    /// Creates a listener and the receiving end its writer loop drains.
    pub fn open() -> (Arc<Self>, Receiver<String>) {
        let (sender, receiver) = mpsc::channel();
        let listener = Arc::new(Self {
            state: Mutex::new(SseListenerState {
                sender: Some(sender),
                close_callbacks: Vec::new(),
                closed: false,
            }),
        });
        (listener, receiver)
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    fn lock_state(&self) -> MutexGuard<'_, SseListenerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_closed(&self) {
        let callbacks = {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            // Dropping the sender ends the writer loop.
            state.sender = None;
            mem::take(&mut state.close_callbacks)
        };

        for callback in callbacks {
            callback();
        }
    }
}

impl Listener for SseListener {
    fn send(&self, payload: &str) -> Result<(), ListenerSendError> {
        let send_result = {
            let state = self.lock_state();
            match &state.sender {
                Some(sender) => sender.send(format_sse_frame(payload)),
                None => return Err(ListenerSendError::Closed),
            }
        };

        if send_result.is_err() {
            self.mark_closed();
            return Err(ListenerSendError::Transport(String::from(
                "SSE writer is no longer running",
            )));
        }

        Ok(())
    }

    fn close(&self) {
        self.mark_closed();
    }

    fn on_close(&self, callback: CloseCallback) {
        let mut state = self.lock_state();
        if !state.closed {
            state.close_callbacks.push(callback);
            return;
        }

        drop(state);
        callback();
    }
}

/// Wraps a payload as one SSE message. Multi-line payloads keep one `data:` field per line.
pub fn format_sse_frame(payload: &str) -> String {
    let mut frame = String::with_capacity(payload.len() + 8);
    for line in payload.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line.strip_suffix('\r').unwrap_or(line));
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

pub fn write_sse_headers(stream: &mut impl Write) -> io::Result<()> {
    let headers = concat!(
        "HTTP/1.1 200 OK\r\n",
        "Content-Type: text/event-stream\r\n",
        "Cache-Control: no-cache\r\n",
        "Connection: keep-alive\r\n",
        "Access-Control-Allow-Origin: *\r\n\r\n"
    );
    stream.write_all(headers.as_bytes())?;
    stream.write_all(b": connected\n\n")?;
    stream.flush()
}

/// Drains queued frames into `stream` until the listener closes or a write fails.
pub fn run_sse_writer(
    stream: &mut impl Write,
    listener: &SseListener,
    receiver: &Receiver<String>,
    keep_alive_interval: Duration,
) {
    loop {
        let frame = match receiver.recv_timeout(keep_alive_interval) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => String::from(KEEP_ALIVE_FRAME),
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if stream.write_all(frame.as_bytes()).is_err() || stream.flush().is_err() {
            break;
        }
    }

    listener.close();
}

pub fn handle_sse_connection(
    mut stream: impl Write,
    coordinator: Arc<BuildStatusCoordinator>,
) -> io::Result<()> {
    write_sse_headers(&mut stream)?;

    let (listener, receiver) = SseListener::open();
    let joined: Arc<dyn Listener> = listener.clone();
    if coordinator.on_listener_join(joined).is_none() {
        // The relay already shut down, so there is nothing to stream.
        return Ok(());
    }
    event_log!(Green "SSE listener joined");

    run_sse_writer(&mut stream, &listener, &receiver, KEEP_ALIVE_INTERVAL);
    event_log!(Yellow "SSE listener left");
    Ok(())
}

#[cfg(test)]
#[path = "tests/sse_tests.rs"]
mod tests;
