//! Client/server message envelopes.
//!
//! Every wire message is `{ "kind": <kebab-case tag>, "data": <body> }`.
//! Kinds without a body (`leave-room`) omit `data`. The envelopes are plain
//! serde enums; [`ClientMessage::from_json`] and [`ServerMessage::to_json`]
//! are the only encode/decode entry points the server uses.

use serde::{Deserialize, Serialize};

use crate::{
    document::Document,
    element::ElementPayload,
    error::ProtocolError,
    ids::{ElementId, RoomId, SessionId},
};

/// Messages sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join a room, creating it on first join.
    JoinRoom(RoomId),

    /// Leave the current room.
    LeaveRoom,

    /// Submit a new element; the server assigns identity fields.
    CreateElement(CreateElement),

    /// Delete an element by id. Unknown ids are a no-op.
    DeleteElement {
        /// Room the element belongs to.
        room_id: RoomId,
        /// Element to delete.
        element_id: ElementId,
    },

    /// Step the room's shared history back one frame.
    Undo(RoomId),

    /// Step the room's shared history forward one frame.
    Redo(RoomId),

    /// Ephemeral cursor position; relayed to other members only.
    CursorMove {
        /// Room whose members should see the cursor.
        room_id: RoomId,
        /// Cursor x coordinate.
        x: f64,
        /// Cursor y coordinate.
        y: f64,
        /// Display label shown next to the cursor.
        label: String,
    },

    /// The cursor left the canvas.
    CursorLeave(RoomId),
}

/// Body of a `create-element` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateElement {
    /// Target room.
    pub room_id: RoomId,
    /// The element body (`type` + `payload` on the wire).
    #[serde(flatten)]
    pub element: ElementPayload,
}

/// Messages sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Authoritative document state after a mutation or on join.
    ///
    /// All members receive the same payload, so every client converges to the
    /// same state after every operation.
    StateUpdate {
        /// The currently visible frame.
        document: Document,
        /// Whether the history cursor can move back.
        can_undo: bool,
        /// Whether the history cursor can move forward.
        can_redo: bool,
    },

    /// Current member list of the room.
    Members {
        /// Session ids of every member, in stable order.
        members: Vec<SessionId>,
    },

    /// Another member's cursor moved.
    RemoteCursor {
        /// Session the cursor belongs to.
        session_id: SessionId,
        /// Cursor x coordinate.
        x: f64,
        /// Cursor y coordinate.
        y: f64,
        /// Display label shown next to the cursor.
        label: String,
    },

    /// Another member's cursor left the canvas.
    RemoteCursorLeave {
        /// Session whose cursor left.
        session_id: SessionId,
    },

    /// The room's backing document was deleted; the room is gone.
    RoomDeleted(RoomId),
}

impl ClientMessage {
    /// Parse a message from its JSON wire form.
    pub fn from_json(input: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(input).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Encode to the JSON wire form.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

impl ServerMessage {
    /// Encode to the JSON wire form.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Parse a message from its JSON wire form.
    pub fn from_json(input: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(input).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}
