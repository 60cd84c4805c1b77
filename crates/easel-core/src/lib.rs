//! Domain logic for the easel realtime whiteboard.
//!
//! This crate holds the pure, I/O-free half of the server: document
//! operations, the bounded shared history stack, and the per-room state
//! machine. Operations return effect values for a runtime to execute rather
//! than performing I/O themselves, so the same logic runs unchanged under the
//! production websocket runtime and under deterministic tests.
//!
//! # Architecture
//!
//! - [`document`]: pure functions over [`easel_proto::Document`] values.
//! - [`history::History`]: bounded frame stack with a cursor; the shared
//!   undo/redo discipline lives here.
//! - [`room::RoomState`]: authoritative state for one room; every operation
//!   returns [`room::RoomEffect`]s describing what to deliver to whom.
//! - [`env::Environment`]: time abstraction so room logic is testable with
//!   virtual clocks.

#![forbid(unsafe_code)]

pub mod document;
pub mod env;
pub mod history;
pub mod ids;
pub mod room;
