//! WebSocket handler for live reload sessions.
//!
//! A session is registered with the hub while the upgrade response is being
//! built, so broadcasts issued as soon as the client sees the handshake are
//! queued for it. One task per session then owns the socket. It forwards
//! queued frames, feeds inbound frames to the hub in arrival order, and closes
//! the socket when the server shuts down.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{
    CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code,
};
use axum::response::Response;
use tokio::sync::mpsc;

use crate::live_reload::SessionId;
use crate::state::AppState;
use crate::static_files;

/// Upper bound for delivering the close frame to a peer on shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle WebSocket upgrade for live reload.
///
/// Requests at the upgrade path that are not valid upgrades get the same 404
/// as any other unknown route.
pub(crate) async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => {
            let (id, outbound) = state.hub.connect();
            let failed = Arc::clone(&state.hub);
            ws.on_failed_upgrade(move |e| {
                tracing::debug!(session = %id, error = %e, "Upgrade failed");
                failed.disconnect(id);
            })
            .on_upgrade(move |socket| handle_socket(socket, state, id, outbound))
        }
        Err(rejection) => {
            tracing::debug!(%rejection, "Rejected non-upgrade request");
            static_files::not_found()
        }
    }
}

/// Handle an established WebSocket connection.
async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    id: SessionId,
    mut outbound: mpsc::UnboundedReceiver<Utf8Bytes>,
) {
    let hub = &state.hub;
    let mut shutdown = hub.shutdown_signal();

    // Upgrade finished after shutdown began
    if *shutdown.borrow_and_update() {
        close_socket(&mut socket).await;
        hub.disconnect(id);
        return;
    }

    loop {
        tokio::select! {
            // Forward queued frames to the client
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                if let Err(e) = socket.send(Message::Text(frame)).await {
                    tracing::debug!(session = %id, error = %e, "Failed to send frame");
                    break;
                }
            }
            // Handle client frames in arrival order
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) => hub.handle_message(id, text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => {
                        if let Ok(text) = std::str::from_utf8(&bytes) {
                            hub.handle_message(id, text);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(session = %id, error = %e, "Session transport error");
                        break;
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    close_socket(&mut socket).await;
                    break;
                }
            }
        }
    }

    hub.disconnect(id);
}

/// Send a close frame, giving up after [`CLOSE_TIMEOUT`].
async fn close_socket(socket: &mut WebSocket) {
    let frame = CloseFrame {
        code: close_code::AWAY,
        reason: "Server shutting down".into(),
    };
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, socket.send(Message::Close(Some(frame)))).await;
}
