//! Connection registry: live connections and per-board rooms.
//!
//! DESIGN
//! ======
//! Each websocket session owns a bounded mpsc receiver; the registry keeps
//! the matching sender plus the set of connections subscribed to each board.
//! Publishing walks only the target room, never the full connection list.
//!
//! Delivery is best-effort: a full or closed queue drops the frame for that
//! one recipient. Nothing is retried and nothing is reported to the sender.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::frame::Frame;
use crate::state::{BoardId, ConnectionId};

// =============================================================================
// TRANSPORT CAPABILITY
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection not registered: {0}")]
    UnknownConnection(ConnectionId),
    #[error("outbound queue full for connection {0}")]
    QueueFull(ConnectionId),
    #[error("connection closed: {0}")]
    Closed(ConnectionId),
}

/// Room-based fan-out that any pub/sub-capable transport can provide.
pub trait RoomTransport {
    fn subscribe(&mut self, connection: ConnectionId, board_id: &str);

    fn unsubscribe(&mut self, connection: ConnectionId, board_id: &str);

    /// Send to every subscriber of `board_id` except `except`. Returns how
    /// many recipients accepted the frame.
    fn publish(&self, board_id: &str, frame: &Frame, except: Option<ConnectionId>) -> usize;

    /// Send to exactly one connection.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the connection is unknown or cannot
    /// accept the frame right now.
    fn send(&self, connection: ConnectionId, frame: Frame) -> Result<(), TransportError>;
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: HashMap<ConnectionId, mpsc::Sender<Frame>>,
    rooms: HashMap<BoardId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection: ConnectionId, tx: mpsc::Sender<Frame>) {
        self.clients.insert(connection, tx);
    }

    /// Drop the connection's sender and its room subscriptions.
    /// Returns `false` if it was not registered.
    pub fn unregister(&mut self, connection: ConnectionId) -> bool {
        self.rooms.retain(|_, members| {
            members.remove(&connection);
            !members.is_empty()
        });
        self.clients.remove(&connection).is_some()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    fn try_send(&self, connection: ConnectionId, frame: Frame) -> Result<(), TransportError> {
        let Some(tx) = self.clients.get(&connection) else {
            return Err(TransportError::UnknownConnection(connection));
        };
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull(connection),
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed(connection),
        })
    }
}

#[cfg(test)]
impl ConnectionRegistry {
    pub fn room_size(&self, board_id: &str) -> usize {
        self.rooms.get(board_id).map_or(0, HashSet::len)
    }

    pub fn is_subscribed(&self, connection: ConnectionId, board_id: &str) -> bool {
        self.rooms
            .get(board_id)
            .is_some_and(|members| members.contains(&connection))
    }
}

impl RoomTransport for ConnectionRegistry {
    fn subscribe(&mut self, connection: ConnectionId, board_id: &str) {
        self.rooms
            .entry(board_id.to_owned())
            .or_default()
            .insert(connection);
    }

    fn unsubscribe(&mut self, connection: ConnectionId, board_id: &str) {
        let Some(members) = self.rooms.get_mut(board_id) else {
            return;
        };
        members.remove(&connection);
        if members.is_empty() {
            self.rooms.remove(board_id);
        }
    }

    fn publish(&self, board_id: &str, frame: &Frame, except: Option<ConnectionId>) -> usize {
        let Some(members) = self.rooms.get(board_id) else {
            return 0;
        };

        let mut delivered = 0;
        for connection in members {
            if except == Some(*connection) {
                continue;
            }
            match self.try_send(*connection, frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%board_id, error = %e, event = %frame.event, "registry: dropped frame"),
            }
        }
        debug!(%board_id, event = %frame.event, delivered, "registry: published");
        delivered
    }

    fn send(&self, connection: ConnectionId, frame: Frame) -> Result<(), TransportError> {
        self.try_send(connection, frame)
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
