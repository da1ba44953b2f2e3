//! WebSocket handler: bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, registers a session and enters a `select!` loop:
//! - Incoming client frames → decode → relay dispatch
//! - Frames queued by board peers → forward to client
//!
//! Inbound frames that fail to decode are logged and dropped. The protocol
//! is fire-and-forget: nothing is ever sent back to report an error.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `lifecycle::connect`
//! 2. Client sends frames → `relay::dispatch` (roster, fan-out)
//! 3. Close or transport error → `lifecycle::disconnect` (`user-left`, prune)

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tracing::{debug, info, warn};

use crate::frame::{ClientEvent, Frame};
use crate::services::lifecycle::{self, Session};
use crate::services::relay;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let (mut session, mut client_rx) = lifecycle::connect(&state).await;
    let connection_id = session.id();
    info!(%connection_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        process_inbound_text(&state, &mut session, text.as_str()).await;
                    }
                    Message::Binary(_) => {
                        warn!(%connection_id, "ws: binary frames are not supported");
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    lifecycle::disconnect(&state, &mut session).await;
    info!(%connection_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode and handle one inbound text frame.
///
/// Kept apart from the socket so tests can drive dispatch without a live
/// websocket.
async fn process_inbound_text(state: &AppState, session: &mut Session, text: &str) {
    if session.is_closed() {
        return;
    }

    let event = match Frame::parse(text).and_then(ClientEvent::try_from) {
        Ok(event) => event,
        Err(e) => {
            warn!(connection_id = %session.id(), error = %e, "ws: dropped inbound frame");
            return;
        }
    };

    debug!(connection_id = %session.id(), event = event.name(), board_id = ?event.board_id(), "ws: recv event");
    session.observe(&event);
    relay::dispatch(state, session.id(), event).await;
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match frame.to_json() {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, event = %frame.event, "ws: failed to serialize frame");
            return Err(());
        }
    };
    debug!(event = %frame.event, "ws: send frame");
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
