//! Session lifecycle: per-connection state and disconnect cleanup.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → `connect` registers an outbound queue → `Connected`
//! 2. `join-board` → `Joined { board_id }` (a later join moves the session)
//! 3. Transport closes → `disconnect` removes the membership, tells the rest
//!    of the board with `user-left`, prunes the board if it is now empty, and
//!    drops the queue → `Disconnected`
//!
//! There is no leave event. Disconnect before any join is a no-op apart from
//! dropping the queue.

use tokio::sync::mpsc;
use tracing::info;

use crate::frame::{ClientEvent, Frame};
use crate::services::directory::{BoardDirectory, Participant};
use crate::services::relay::{self, Effect};
use crate::state::{AppState, BoardId, ConnectionId, Hub};

// =============================================================================
// SESSION STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Joined { board_id: BoardId },
    Disconnected,
}

/// Connection-local view of the lifecycle. Owned by the websocket task.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    state: SessionState,
}

impl Session {
    #[must_use]
    pub fn new(id: ConnectionId) -> Self {
        Self { id, state: SessionState::Connected }
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Disconnected
    }

    /// Track the transition an inbound event causes. Only a join moves state.
    pub fn observe(&mut self, event: &ClientEvent) {
        if self.is_closed() {
            return;
        }
        if let ClientEvent::JoinBoard(join) = event {
            self.state = SessionState::Joined { board_id: join.board_id.clone() };
        }
    }

    fn close(&mut self) {
        self.state = SessionState::Disconnected;
    }
}

// =============================================================================
// PURE TRANSITIONS
// =============================================================================

/// Remove the membership held by `from`, if any, and describe the notice to
/// the remaining participants.
pub fn part(directory: &mut BoardDirectory, from: ConnectionId) -> Vec<Effect> {
    let Some((board_id, participant)) = directory.remove_participant(from) else {
        return Vec::new();
    };
    departure_effects(directory, board_id, &participant)
}

/// Effects announcing that `participant` already left `board_id`.
pub fn departure_effects(directory: &BoardDirectory, board_id: BoardId, participant: &Participant) -> Vec<Effect> {
    let remaining = directory.participant_count(&board_id);
    info!(%board_id, username = %participant.username, remaining, "lifecycle: left board");
    if !directory.contains_board(&board_id) {
        info!(%board_id, "lifecycle: pruned empty board");
    }

    vec![
        Effect::Unsubscribe { board_id: board_id.clone() },
        Effect::Publish { board_id, frame: Frame::user_left(participant) },
    ]
}

// =============================================================================
// CONNECT / DISCONNECT
// =============================================================================

/// Register a new connection and hand back its session and outbound queue.
pub async fn connect(state: &AppState) -> (Session, mpsc::Receiver<Frame>) {
    let session = Session::new(ConnectionId::new());
    let (tx, rx) = mpsc::channel::<Frame>(state.client_channel_capacity);

    let mut hub = state.hub.write().await;
    hub.registry.register(session.id(), tx);
    info!(connection_id = %session.id(), connections = hub.registry.connection_count(), "lifecycle: connected");

    (session, rx)
}

/// Tear a session down. Safe to call more than once.
pub async fn disconnect(state: &AppState, session: &mut Session) {
    if session.is_closed() {
        return;
    }

    let from = session.id();
    let last_state = session.state().clone();
    let mut hub = state.hub.write().await;
    let Hub { directory, registry } = &mut *hub;

    let effects = part(directory, from);
    relay::apply(registry, from, effects);
    registry.unregister(from);
    session.close();

    info!(
        connection_id = %from,
        last_state = ?last_state,
        connections = registry.connection_count(),
        "lifecycle: disconnected"
    );
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
