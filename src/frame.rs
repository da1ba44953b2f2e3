//! Frame: the wire envelope for every websocket message.
//!
//! ARCHITECTURE
//! ============
//! Every message in either direction is a single JSON text frame of the form
//! `{"event": "<name>", "data": <payload>}`. Inbound frames are decoded into a
//! typed `ClientEvent`; outbound frames are built with the constructors below.
//!
//! DESIGN
//! ======
//! - The relay is payload-agnostic: draw and text payloads are carried as the
//!   raw JSON object the client sent and forwarded unmodified.
//! - Only `boardId` is ever read from a relayed payload.
//! - Join fields are opaque. Missing values become empty strings and
//!   non-string values are kept as their JSON text.
//! - A non-string `boardId` names a different board than the string with the
//!   same text: `7` and `"7"` never share a room.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::directory::Participant;
use crate::state::BoardId;

// =============================================================================
// EVENT NAMES
// =============================================================================

/// Client asks to join a board. Server never emits this.
pub const EVENT_JOIN_BOARD: &str = "join-board";

/// Line segment. Relayed in both directions.
pub const EVENT_DRAW: &str = "draw";

/// Clear signal. Relayed in both directions.
pub const EVENT_CLEAR_CANVAS: &str = "clear-canvas";

/// Text placement. Relayed in both directions.
pub const EVENT_ADD_TEXT: &str = "add-text";

/// Roster sent to a connection right after it joins.
pub const EVENT_USERS_IN_BOARD: &str = "users-in-board";

/// A participant arrived on the board.
pub const EVENT_USER_JOINED: &str = "user-joined";

/// A participant left the board.
pub const EVENT_USER_LEFT: &str = "user-left";

/// Payload key naming the board a relayed event is scoped to.
pub const FIELD_BOARD_ID: &str = "boardId";

/// Marks a board key built from a non-string `boardId`.
const NON_STRING_BOARD_PREFIX: char = '\u{0}';

// =============================================================================
// TYPES
// =============================================================================

/// Flat JSON object payload.
pub type Data = serde_json::Map<String, Value>;

/// The universal message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    /// Absent on bare signals such as the outbound `clear-canvas`.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("payload for {0} must be an object")]
    NotAnObject(String),
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }

    /// A frame with no payload.
    #[must_use]
    pub fn signal(event: impl Into<String>) -> Self {
        Self::new(event, Value::Null)
    }

    /// Forward a client payload unmodified under the given event name.
    #[must_use]
    pub fn relay(event: impl Into<String>, payload: Data) -> Self {
        Self::new(event, Value::Object(payload))
    }

    #[must_use]
    pub fn users_in_board(participants: &[Participant]) -> Self {
        Self::new(EVENT_USERS_IN_BOARD, serde_json::json!(participants))
    }

    #[must_use]
    pub fn user_joined(participant: &Participant) -> Self {
        Self::new(EVENT_USER_JOINED, serde_json::json!(participant))
    }

    #[must_use]
    pub fn user_left(participant: &Participant) -> Self {
        Self::new(EVENT_USER_LEFT, serde_json::json!(participant))
    }

    #[must_use]
    pub fn clear_canvas() -> Self {
        Self::signal(EVENT_CLEAR_CANVAS)
    }
}

// =============================================================================
// CODEC
// =============================================================================

impl Frame {
    /// Decode one inbound text message.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::Json` if the text is not a valid envelope.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode for the wire.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }
}

// =============================================================================
// CLIENT EVENTS
// =============================================================================

/// `join-board` payload after lenient field extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinBoard {
    pub board_id: BoardId,
    pub user_id: String,
    pub username: String,
}

/// A payload forwarded verbatim to the rest of a board.
#[derive(Debug, Clone, PartialEq)]
pub struct Relayed {
    /// `None` when the payload carries no usable `boardId`; such events reach nobody.
    pub board_id: Option<BoardId>,
    pub payload: Data,
}

impl Relayed {
    fn from_payload(payload: Data) -> Self {
        let board_id = payload.get(FIELD_BOARD_ID).and_then(board_key);
        Self { board_id, payload }
    }
}

/// Typed inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    JoinBoard(JoinBoard),
    Draw(Relayed),
    ClearCanvas { board_id: Option<BoardId> },
    AddText(Relayed),
}

impl ClientEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinBoard(_) => EVENT_JOIN_BOARD,
            Self::Draw(_) => EVENT_DRAW,
            Self::ClearCanvas { .. } => EVENT_CLEAR_CANVAS,
            Self::AddText(_) => EVENT_ADD_TEXT,
        }
    }

    /// Board the event is addressed to, if any.
    #[must_use]
    pub fn board_id(&self) -> Option<&str> {
        match self {
            Self::JoinBoard(join) => Some(&join.board_id),
            Self::Draw(relayed) | Self::AddText(relayed) => relayed.board_id.as_deref(),
            Self::ClearCanvas { board_id } => board_id.as_deref(),
        }
    }
}

impl TryFrom<Frame> for ClientEvent {
    type Error = FrameError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let data = match frame.data {
            Value::Null => Data::new(),
            Value::Object(map) => map,
            _ => return Err(FrameError::NotAnObject(frame.event)),
        };

        match frame.event.as_str() {
            EVENT_JOIN_BOARD => Ok(Self::JoinBoard(JoinBoard {
                board_id: data.get(FIELD_BOARD_ID).and_then(board_key).unwrap_or_default(),
                user_id: string_field(&data, "userId"),
                username: string_field(&data, "username"),
            })),
            EVENT_DRAW => Ok(Self::Draw(Relayed::from_payload(data))),
            EVENT_CLEAR_CANVAS => Ok(Self::ClearCanvas { board_id: data.get(FIELD_BOARD_ID).and_then(board_key) }),
            EVENT_ADD_TEXT => Ok(Self::AddText(Relayed::from_payload(data))),
            _ => Err(FrameError::UnknownEvent(frame.event)),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Strings pass through, null is absent, anything else keeps its JSON text.
fn opaque_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Room key for a `boardId`. Non-string ids are tagged so they cannot
/// collide with a string id of the same text.
fn board_key(value: &Value) -> Option<BoardId> {
    match value {
        Value::String(s) => Some(s.clone()),
        other => opaque_string(other).map(|text| format!("{NON_STRING_BOARD_PREFIX}{text}")),
    }
}

fn string_field(data: &Data, key: &str) -> String {
    data.get(key).and_then(opaque_string).unwrap_or_default()
}

// =============================================================================
// TESTS
// =============================================================================
