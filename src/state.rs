//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the `Hub`: the board directory and the connection registry behind
//! one lock, so a join or a disconnect is applied to both in a single step and
//! no handler ever observes membership that is half updated.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::directory::BoardDirectory;
use crate::services::registry::ConnectionRegistry;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque, caller-supplied board name.
pub type BoardId = String;

/// Handle for one live websocket session. Minted on upgrade, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// HUB
// =============================================================================

/// Everything that changes when a connection joins, relays, or leaves.
#[derive(Default)]
pub struct Hub {
    pub directory: BoardDirectory,
    pub registry: ConnectionRegistry,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self { directory: BoardDirectory::new(), registry: ConnectionRegistry::new() }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; the hub is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<RwLock<Hub>>,
    /// Bound on each connection's outbound queue.
    pub client_channel_capacity: usize,
}

impl AppState {
    #[must_use]
    pub fn new(client_channel_capacity: usize) -> Self {
        Self { hub: Arc::new(RwLock::new(Hub::new())), client_channel_capacity }
    }

    /// Number of boards with at least one participant.
    pub async fn active_boards(&self) -> usize {
        self.hub.read().await.directory.board_count()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
