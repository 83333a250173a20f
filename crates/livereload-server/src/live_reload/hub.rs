//! Notification hub.
//!
//! Tracks open sessions and fans commands out to them. Delivery never waits on
//! a peer: each session owns a channel drained by its own socket task, and
//! queueing into it never blocks. Frames are never dropped for an open
//! session; a slow peer only grows its own queue.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{Notify, mpsc, watch};
use uuid::Uuid;

use super::protocol::{InboundMessage, OutboundCommand};

/// Identifier of an open session.
pub type SessionId = Uuid;

/// Sending half of a session's outbound queue.
type Outbox = mpsc::UnboundedSender<Utf8Bytes>;

/// Registry of open sessions plus the broadcast primitives.
pub struct Hub {
    server_name: String,
    sessions: Mutex<HashMap<SessionId, Outbox>>,
    /// Woken whenever the registry becomes empty.
    emptied: Notify,
    shutdown: watch::Sender<bool>,
}

impl Hub {
    /// Create a hub whose frames carry `server_name`.
    pub fn new(server_name: impl Into<String>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            server_name: server_name.into(),
            sessions: Mutex::new(HashMap::new()),
            emptied: Notify::new(),
            shutdown,
        }
    }

    /// Name stamped into every outbound frame.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Register a freshly upgraded session.
    ///
    /// The returned receiver must be drained by whoever owns the socket.
    /// Dropping it closes the session from the hub's point of view.
    pub fn connect(&self) -> (SessionId, mpsc::UnboundedReceiver<Utf8Bytes>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sessions = self.lock_sessions();
        sessions.insert(id, tx);
        tracing::debug!(session = %id, sessions = sessions.len(), "Session opened");
        (id, rx)
    }

    /// Remove a session after its transport closed or failed.
    pub fn disconnect(&self, id: SessionId) {
        let mut sessions = self.lock_sessions();
        if sessions.remove(&id).is_some() {
            tracing::debug!(session = %id, sessions = sessions.len(), "Session closed");
        }
        self.notify_if_empty(&sessions);
    }

    /// Handle a text frame received on session `id`.
    ///
    /// `hello` is answered on the same session. Malformed frames and any other
    /// command are ignored.
    pub fn handle_message(&self, id: SessionId, payload: &str) {
        let Some(message) = InboundMessage::parse(payload) else {
            tracing::debug!(session = %id, "Ignoring malformed message");
            return;
        };

        if message.is_hello() {
            self.send(id, &OutboundCommand::hello());
        } else {
            tracing::trace!(session = %id, command = message.command(), "Ignoring command");
        }
    }

    /// Queue `command` for a single session.
    ///
    /// Returns `false` if the session is unknown or has gone away (in which
    /// case it is removed).
    pub fn send(&self, id: SessionId, command: &OutboundCommand) -> bool {
        let Some(frame) = self.frame(command) else {
            return false;
        };

        let mut sessions = self.lock_sessions();
        let Some(tx) = sessions.get(&id) else {
            return false;
        };

        if deliver(id, tx, frame) {
            true
        } else {
            sessions.remove(&id);
            self.notify_if_empty(&sessions);
            false
        }
    }

    /// Queue `command` for every open session.
    ///
    /// A failing session never stops delivery to the others. Returns the
    /// number of sessions the frame was queued for.
    pub fn broadcast(&self, command: &OutboundCommand) -> usize {
        let Some(frame) = self.frame(command) else {
            return 0;
        };

        let mut sessions = self.lock_sessions();
        let mut sent = 0;
        sessions.retain(|id, tx| {
            let open = deliver(*id, tx, frame.clone());
            if open {
                sent += 1;
            }
            open
        });
        self.notify_if_empty(&sessions);

        tracing::debug!(command = command.name(), recipients = sent, "Broadcast command");
        sent
    }

    /// Tell every client that `path` changed.
    pub fn reload(&self, path: &str) -> usize {
        self.broadcast(&OutboundCommand::reload(path))
    }

    /// Show `message` in every client.
    pub fn alert(&self, message: &str) -> usize {
        self.broadcast(&OutboundCommand::alert(message))
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Whether session `id` is still registered.
    pub fn is_open(&self, id: SessionId) -> bool {
        self.lock_sessions().contains_key(&id)
    }

    /// Receiver that flips to `true` once the server starts shutting down.
    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Ask every session task (and the listener) to stop.
    pub(crate) fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Clear the shutdown flag so the hub can serve again.
    pub(crate) fn reset_shutdown(&self) {
        self.shutdown.send_replace(false);
    }

    /// Wait until no session is registered.
    pub(crate) async fn wait_empty(&self) {
        loop {
            // Created before the check so a concurrent removal is not missed
            let notified = self.emptied.notified();
            if self.session_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn frame(&self, command: &OutboundCommand) -> Option<Utf8Bytes> {
        match command.to_json(&self.server_name) {
            Ok(json) => Some(Utf8Bytes::from(json)),
            Err(e) => {
                tracing::warn!(command = command.name(), error = %e, "Failed to serialize command");
                None
            }
        }
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Outbox>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_if_empty(&self, sessions: &HashMap<SessionId, Outbox>) {
        if sessions.is_empty() {
            self.emptied.notify_waiters();
        }
    }
}

/// Queue `frame` for one session. Returns `false` once its socket task is gone.
fn deliver(id: SessionId, tx: &Outbox, frame: Utf8Bytes) -> bool {
    if tx.send(frame).is_ok() {
        true
    } else {
        tracing::debug!(session = %id, "Session gone, removing");
        false
    }
}
