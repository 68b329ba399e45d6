//! WebSocket upgrade and per-connection handler.
//!
//! The handler only moves bytes: inbound frames go through the session's
//! size gate and the router, outbound bytes come from the session buffer,
//! and notification wake-ups are turned into writable events.

use std::sync::atomic::Ordering;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::stream::StreamExt;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::session::Session;
use crate::state::AppState;

pub const PROTOCOL: &str = "raspberry_control_protocol";

/// Routes served by the agent: the socket is reachable at `/` and `/ws`.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.protocols([PROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let id = state.next_session.fetch_add(1, Ordering::Relaxed);
    state.client_count.fetch_add(1, Ordering::Relaxed);

    // Ensure we decrement on disconnect (drop).
    struct ClientGuard(AppState);
    impl Drop for ClientGuard {
        fn drop(&mut self) {
            self.0.client_count.fetch_sub(1, Ordering::Relaxed);
        }
    }
    let _guard = ClientGuard(state.clone());

    info!(
        session = id,
        clients = state.client_count.load(Ordering::Relaxed),
        "connection established"
    );

    let mut session = Session::new(id, state.config.max_reply);
    let mut writable = state.broadcaster.subscribe();
    // Notifications published before this client connected are not replayed.
    writable.borrow_and_update();

    let outcome = loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break Ok(());
            }
            msg = socket.next() => {
                let frame = match msg {
                    Some(Ok(Message::Text(text))) => text.into_bytes(),
                    Some(Ok(Message::Binary(bytes))) => bytes,
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(SessionError::Transport(e.to_string())),
                };
                debug!(session = id, bytes = frame.len(), "frame received");
                if let Err(e) = session.accept_frame(frame.len()) {
                    break Err(e);
                }
                let reply = state.router.handle_frame(id, &frame).await;
                if session.load_reply(&reply) {
                    if let Err(e) = flush(&mut socket, &mut session, None).await {
                        break Err(e);
                    }
                }
            }
            changed = writable.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let note = state.broadcaster.current();
                if let Err(e) = flush(&mut socket, &mut session, note.as_deref()).await {
                    break Err(e);
                }
            }
        }
    };

    match outcome {
        Ok(()) => info!(session = id, "connection closed"),
        Err(e) => {
            warn!(session = id, error = %e, "hanging up");
            let _ = socket.send(Message::Close(None)).await;
        }
    }
}

/// Serve one writable event: write whatever the session has pending.
async fn flush(
    socket: &mut WebSocket,
    session: &mut Session,
    notification: Option<&str>,
) -> Result<(), SessionError> {
    let Some(bytes) = session.on_writable(notification) else {
        return Ok(());
    };
    let len = bytes.len();
    let text = String::from_utf8_lossy(bytes).into_owned();
    match socket.send(Message::Text(text)).await {
        Ok(()) => session.complete_write(len),
        Err(e) => {
            let _ = session.complete_write(0);
            Err(SessionError::Transport(e.to_string()))
        }
    }
}
