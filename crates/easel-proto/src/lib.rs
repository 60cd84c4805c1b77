//! Wire types for the easel realtime whiteboard protocol.
//!
//! Every message on the wire is a JSON envelope `{ "kind": ..., "data": ... }`
//! exchanged over a persistent bidirectional transport. This crate defines the
//! identifier types, the element and document model, and the client/server
//! message envelopes. It contains no I/O and no room logic; the server and the
//! domain crates build on these types.
//!
//! # Invariants
//!
//! - Element `id`s are server-assigned and immutable once assigned.
//! - `created_at` is a server-monotonic counter, not wall time, so that render
//!   order is stable across replays.
//! - Encoding a message and decoding it again MUST produce an equivalent
//!   value. This is verified by round-trip tests.

#![forbid(unsafe_code)]

mod document;
mod element;
mod error;
mod ids;
mod message;

pub use document::Document;
pub use element::{
    Element, ElementPayload, Point, Shape, ShapeKind, ShapePayload, Stroke, StrokeMode,
    StrokePayload, Text, TextPayload,
};
pub use error::ProtocolError;
pub use ids::{ElementId, RoomId, RoomIdError, SessionId};
pub use message::{ClientMessage, CreateElement, ServerMessage};
