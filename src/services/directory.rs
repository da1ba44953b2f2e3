//! Board directory: who is on which board.
//!
//! DESIGN
//! ======
//! A two-level map: board id -> connection -> participant. Memberships are
//! keyed by connection, not by user identity, so one user with two tabs open
//! holds two independent records.
//!
//! Invariants kept by every mutating method:
//! - a connection belongs to at most one board;
//! - a board with no participants is not in the map.
//!
//! The directory is plain data. Locking belongs to the owner (`state::Hub`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::state::{BoardId, ConnectionId};

// =============================================================================
// TYPES
// =============================================================================

/// One joined connection as the other participants see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Client-persisted identity. Not unique across connections.
    pub user_id: String,
    /// Display name chosen at join time.
    pub username: String,
}

#[derive(Debug, Default)]
pub struct BoardDirectory {
    boards: HashMap<BoardId, HashMap<ConnectionId, Participant>>,
}

// =============================================================================
// MUTATION
// =============================================================================

impl BoardDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the participant map for a board, creating an empty one if needed.
    ///
    /// An empty entry must be populated before the owning lock is released.
    pub fn ensure_board(&mut self, board_id: &str) -> &mut HashMap<ConnectionId, Participant> {
        self.boards.entry(board_id.to_owned()).or_default()
    }

    /// Insert or overwrite the membership of `connection` under `board_id`.
    ///
    /// If the connection was registered under a different board, that
    /// membership is removed first and returned so the caller can notify the
    /// old board. Rejoining the same board is a plain overwrite and returns `None`.
    pub fn add_participant(
        &mut self,
        board_id: &str,
        connection: ConnectionId,
        participant: Participant,
    ) -> Option<(BoardId, Participant)> {
        let moving = self
            .board_of(connection)
            .is_some_and(|current| current != board_id);
        let displaced = if moving { self.remove_participant(connection) } else { None };

        self.ensure_board(board_id).insert(connection, participant);
        displaced
    }

    /// Remove whatever membership `connection` holds.
    ///
    /// Returns the board it was on and the removed record, or `None` if the
    /// connection never joined. Deletes the board once it is empty.
    pub fn remove_participant(&mut self, connection: ConnectionId) -> Option<(BoardId, Participant)> {
        let board_id = self.board_of(connection)?.to_owned();
        let participants = self.boards.get_mut(&board_id)?;
        let participant = participants.remove(&connection)?;

        if participants.is_empty() {
            self.boards.remove(&board_id);
        }
        Some((board_id, participant))
    }
}

// =============================================================================
// QUERIES
// =============================================================================

impl BoardDirectory {
    /// Current participants of a board, in no particular order.
    #[must_use]
    pub fn list_participants(&self, board_id: &str) -> Vec<Participant> {
        self.boards
            .get(board_id)
            .map(|participants| participants.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Board the connection is currently joined to.
    #[must_use]
    pub fn board_of(&self, connection: ConnectionId) -> Option<&str> {
        self.boards
            .iter()
            .find(|(_, participants)| participants.contains_key(&connection))
            .map(|(board_id, _)| board_id.as_str())
    }

    #[must_use]
    pub fn participant_count(&self, board_id: &str) -> usize {
        self.boards.get(board_id).map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn board_count(&self) -> usize {
        self.boards.len()
    }

    #[must_use]
    pub fn contains_board(&self, board_id: &str) -> bool {
        self.boards.contains_key(board_id)
    }
}

#[cfg(test)]
#[path = "directory_test.rs"]
mod tests;
