//! Event relay: join handling and verbatim fan-out of drawing events.
//!
//! DESIGN
//! ======
//! `handle` is pure business logic: it reads and mutates the directory and
//! returns a list of `Effect`s relative to the sending connection. It never
//! touches a socket. `apply` owns all outbound concerns and performs those
//! effects against any `RoomTransport`.
//!
//! Relayed events are not checked against the sender's membership: the
//! `boardId` inside the payload decides the room. An unknown board is an
//! empty room and the publish reaches nobody.

use tracing::{debug, info, warn};

use crate::frame::{ClientEvent, EVENT_ADD_TEXT, EVENT_DRAW, Frame, JoinBoard, Relayed};
use crate::services::directory::{BoardDirectory, Participant};
use crate::services::lifecycle;
use crate::services::registry::RoomTransport;
use crate::state::{AppState, BoardId, ConnectionId, Hub};

// =============================================================================
// EFFECT
// =============================================================================

/// What `handle` wants done on behalf of the sending connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Add the sender to the board's room.
    Subscribe { board_id: BoardId },
    /// Remove the sender from the board's room.
    Unsubscribe { board_id: BoardId },
    /// Send a frame to the sender only.
    Reply(Frame),
    /// Send a frame to everyone in the board's room except the sender.
    Publish { board_id: BoardId, frame: Frame },
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Apply one inbound event to the directory and describe the resulting traffic.
pub fn handle(directory: &mut BoardDirectory, from: ConnectionId, event: ClientEvent) -> Vec<Effect> {
    match event {
        ClientEvent::JoinBoard(join) => handle_join(directory, from, join),
        ClientEvent::Draw(relayed) => relay(EVENT_DRAW, relayed),
        ClientEvent::AddText(relayed) => relay(EVENT_ADD_TEXT, relayed),
        ClientEvent::ClearCanvas { board_id } => board_id
            .map(|board_id| vec![Effect::Publish { board_id, frame: Frame::clear_canvas() }])
            .unwrap_or_default(),
    }
}

fn handle_join(directory: &mut BoardDirectory, from: ConnectionId, join: JoinBoard) -> Vec<Effect> {
    let JoinBoard { board_id, user_id, username } = join;
    let participant = Participant { user_id, username };
    let mut effects = Vec::with_capacity(5);

    // A connection holds one membership. Moving boards parts the old one.
    if let Some((old_board, old_participant)) = directory.add_participant(&board_id, from, participant.clone()) {
        effects.extend(lifecycle::departure_effects(directory, old_board, &old_participant));
    }

    info!(
        %board_id,
        connection_id = %from,
        username = %participant.username,
        participants = directory.participant_count(&board_id),
        "relay: joined board"
    );

    let roster = directory.list_participants(&board_id);
    effects.push(Effect::Subscribe { board_id: board_id.clone() });
    effects.push(Effect::Publish { board_id, frame: Frame::user_joined(&participant) });
    effects.push(Effect::Reply(Frame::users_in_board(&roster)));
    effects
}

fn relay(event: &str, relayed: Relayed) -> Vec<Effect> {
    let Relayed { board_id, payload } = relayed;
    let Some(board_id) = board_id else {
        debug!(event, "relay: no boardId, nothing to publish");
        return Vec::new();
    };
    vec![Effect::Publish { board_id, frame: Frame::relay(event, payload) }]
}

// =============================================================================
// APPLY
// =============================================================================

/// Perform effects for `from` against a transport. Send failures are logged
/// and dropped.
pub fn apply<T: RoomTransport + ?Sized>(transport: &mut T, from: ConnectionId, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Subscribe { board_id } => transport.subscribe(from, &board_id),
            Effect::Unsubscribe { board_id } => transport.unsubscribe(from, &board_id),
            Effect::Reply(frame) => {
                if let Err(e) = transport.send(from, frame) {
                    warn!(connection_id = %from, error = %e, "relay: reply dropped");
                }
            }
            Effect::Publish { board_id, frame } => {
                transport.publish(&board_id, &frame, Some(from));
            }
        }
    }
}

/// Handle one inbound event under the hub lock.
pub async fn dispatch(state: &AppState, from: ConnectionId, event: ClientEvent) {
    let mut hub = state.hub.write().await;
    let Hub { directory, registry } = &mut *hub;
    let effects = handle(directory, from, event);
    apply(registry, from, effects);
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
