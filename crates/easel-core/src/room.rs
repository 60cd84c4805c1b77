//! Authoritative per-room state machine.
//!
//! A room exclusively owns its history and member set. Sessions submit
//! intent; the room computes the result and returns [`RoomEffect`]s for the
//! runtime to execute (enqueue into per-session outbound queues). The runtime
//! serializes all operations on a room, which yields a per-room linearizable
//! history: every member observes the same sequence of state updates in the
//! room's internal append order.
//!
//! Element ids and `created_at` ticks are assigned here, under that
//! serialization, so append order is deterministic even under concurrent
//! submissions.
//!
//! Generic over `I` (instant type) to support virtual time in tests.

use std::collections::BTreeSet;

use easel_proto::{
    Document, Element, ElementId, ElementPayload, RoomId, ServerMessage, SessionId, Shape, Stroke,
    Text,
};

use crate::{
    document,
    env::Environment,
    history::History,
    ids::ElementIdAllocator,
};

/// Effects produced by room operations, executed by the runtime.
///
/// Delivery is non-blocking from the room's perspective: the runtime enqueues
/// into per-session outbound queues and sheds sessions whose queues overflow.
/// A failed delivery never fails the operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEffect {
    /// Deliver a message to a single session.
    Send {
        /// Receiving session.
        to: SessionId,
        /// Message to deliver.
        message: ServerMessage,
    },

    /// Deliver the same message to a set of sessions.
    Broadcast {
        /// Receiving sessions, in deterministic order.
        to: Vec<SessionId>,
        /// Message to deliver.
        message: ServerMessage,
    },
}

/// Authoritative state for one room.
pub struct RoomState<I> {
    room_id: RoomId,
    history: History,
    members: BTreeSet<SessionId>,
    ids: ElementIdAllocator,
    /// Monotonic per-room creation counter. Independent of wall time so
    /// render order is stable across replays.
    clock: u64,
    /// Time of the last mutation not yet persisted.
    dirty_since: Option<I>,
    /// Monotonic mutation counter used to coalesce saves.
    revision: u64,
    /// Cold load failed; saves are refused so a fresh save cannot overwrite
    /// data that may still exist in the store.
    load_failed: bool,
}

impl<I: Copy> RoomState<I> {
    /// Create a room seeded with an empty document.
    pub fn new(room_id: RoomId, ids: ElementIdAllocator, history_cap: usize) -> Self {
        Self {
            room_id,
            history: History::new(Document::default(), history_cap),
            members: BTreeSet::new(),
            ids,
            clock: 0,
            dirty_since: None,
            revision: 0,
            load_failed: false,
        }
    }

    /// Seed the baseline frame from a cold-loaded document.
    ///
    /// Replaces the history with the loaded baseline and reserves element ids
    /// and creation ticks past the loaded contents, so new elements never
    /// collide with persisted ones.
    pub fn seed(&mut self, baseline: Document) {
        self.clock = baseline.max_created_at().map_or(0, |t| t + 1);
        if let Some(max) = baseline.max_element_id() {
            self.ids.reserve_past(max);
        }
        self.history = History::new(baseline, self.history.cap());
    }

    /// Record that the cold load failed; saves will be refused.
    pub fn mark_load_failed(&mut self) {
        self.load_failed = true;
    }

    /// Whether saves are refused after a failed cold load.
    pub fn saves_refused(&self) -> bool {
        self.load_failed
    }

    /// Add a session to the room.
    ///
    /// The joiner receives the current snapshot with undo/redo flags; every
    /// member (joiner included) receives the updated member list.
    pub fn join(&mut self, session: SessionId) -> Vec<RoomEffect> {
        self.members.insert(session);
        vec![
            RoomEffect::Send {
                to: session,
                message: self.state_update(),
            },
            RoomEffect::Broadcast {
                to: self.member_ids(),
                message: self.members_message(),
            },
        ]
    }

    /// Remove a session from the room.
    ///
    /// Remaining members receive the updated member list. Leaving a room the
    /// session is not in produces nothing.
    pub fn leave(&mut self, session: SessionId) -> Vec<RoomEffect> {
        if !self.members.remove(&session) {
            return Vec::new();
        }
        if self.members.is_empty() {
            return Vec::new();
        }
        vec![RoomEffect::Broadcast {
            to: self.member_ids(),
            message: self.members_message(),
        }]
    }

    /// Whether the member set is empty (the room is eligible for destroy).
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Append a new element submitted by `author`.
    pub fn create_element<E>(
        &mut self,
        author: SessionId,
        payload: ElementPayload,
        env: &E,
    ) -> Vec<RoomEffect>
    where
        E: Environment<Instant = I>,
    {
        if self.refuse_non_member(author, "create-element") {
            return Vec::new();
        }

        let element = self.materialize(author, payload);
        match document::add_element(self.history.current(), element) {
            Ok(next) => self.commit(next, env),
            Err(err) => {
                // Ids come from the shared allocator, so this cannot happen
                // unless allocator state was lost. Drop the edit rather than
                // corrupt the document.
                tracing::error!(room_id = %self.room_id, error = %err, "dropping create");
                Vec::new()
            }
        }
    }

    /// Delete an element by id.
    ///
    /// Unknown ids are a no-op: nothing is appended to history and nothing is
    /// broadcast.
    pub fn delete_element<E>(
        &mut self,
        session: SessionId,
        id: ElementId,
        env: &E,
    ) -> Vec<RoomEffect>
    where
        E: Environment<Instant = I>,
    {
        if self.refuse_non_member(session, "delete-element") {
            return Vec::new();
        }

        let (next, changed) = document::remove_element(self.history.current(), id);
        if !changed {
            return Vec::new();
        }
        self.commit(next, env)
    }

    /// Step the history cursor back one frame.
    ///
    /// A boundary undo is a silent no-op with no broadcast.
    pub fn undo<E>(&mut self, session: SessionId, env: &E) -> Vec<RoomEffect>
    where
        E: Environment<Instant = I>,
    {
        if self.refuse_non_member(session, "undo") {
            return Vec::new();
        }
        if !self.history.undo() {
            return Vec::new();
        }
        self.mark_dirty(env);
        self.broadcast_state()
    }

    /// Step the history cursor forward one frame.
    ///
    /// A boundary redo is a silent no-op with no broadcast.
    pub fn redo<E>(&mut self, session: SessionId, env: &E) -> Vec<RoomEffect>
    where
        E: Environment<Instant = I>,
    {
        if self.refuse_non_member(session, "redo") {
            return Vec::new();
        }
        if !self.history.redo() {
            return Vec::new();
        }
        self.mark_dirty(env);
        self.broadcast_state()
    }

    /// Relay a cursor position to every other member.
    ///
    /// Presence never touches history or persistence and is dropped silently
    /// when the sender is not a member.
    pub fn cursor_move(&self, sender: SessionId, x: f64, y: f64, label: String) -> Vec<RoomEffect> {
        if !self.members.contains(&sender) {
            return Vec::new();
        }
        let to = self.others(sender);
        if to.is_empty() {
            return Vec::new();
        }
        vec![RoomEffect::Broadcast {
            to,
            message: ServerMessage::RemoteCursor {
                session_id: sender,
                x,
                y,
                label,
            },
        }]
    }

    /// Relay a cursor departure to every other member.
    pub fn cursor_leave(&self, sender: SessionId) -> Vec<RoomEffect> {
        if !self.members.contains(&sender) {
            return Vec::new();
        }
        let to = self.others(sender);
        if to.is_empty() {
            return Vec::new();
        }
        vec![RoomEffect::Broadcast {
            to,
            message: ServerMessage::RemoteCursorLeave { session_id: sender },
        }]
    }

    /// The room's id.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Session ids of every member, in ascending order.
    pub fn member_ids(&self) -> Vec<SessionId> {
        self.members.iter().copied().collect()
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// The currently visible frame.
    pub fn current_document(&self) -> &Document {
        self.history.current()
    }

    /// Whether undo is currently available to clients.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether redo is currently available to clients.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Number of retained history frames.
    pub fn frame_count(&self) -> usize {
        self.history.frame_count()
    }

    /// Whether the room has changes not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    /// Snapshot for persistence: the current frame and the revision it
    /// corresponds to.
    pub fn snapshot(&self) -> (Document, u64) {
        (self.history.current().clone(), self.revision)
    }

    /// Record a completed save attempt for `revision`.
    ///
    /// The dirty marker is cleared only if no mutation happened since the
    /// snapshot was taken; otherwise the room stays dirty and the next
    /// persistence tick picks up the newer state.
    pub fn mark_saved(&mut self, revision: u64) {
        if self.revision == revision {
            self.dirty_since = None;
        }
    }

    fn refuse_non_member(&self, session: SessionId, op: &str) -> bool {
        if self.members.contains(&session) {
            return false;
        }
        tracing::debug!(
            room_id = %self.room_id,
            session_id = %session,
            op,
            "dropping operation from non-member"
        );
        true
    }

    fn materialize(&mut self, author: SessionId, payload: ElementPayload) -> Element {
        let id = self.ids.next_id();
        let created_at = self.clock;
        self.clock += 1;
        match payload {
            ElementPayload::Line(p) => Element::Stroke(Stroke {
                id,
                author,
                created_at,
                points: p.points,
                color: p.color,
                stroke_width: p.stroke_width,
                mode: p.mode,
            }),
            ElementPayload::Shape(p) => Element::Shape(Shape {
                id,
                author,
                created_at,
                kind: p.kind,
                start: p.start,
                end: p.end,
                color: p.color,
                stroke_width: p.stroke_width,
                fill: p.fill,
            }),
            ElementPayload::Text(p) => Element::Text(Text {
                id,
                author,
                created_at,
                anchor: p.anchor,
                content: p.content,
                font_size: p.font_size,
                font_family: p.font_family,
                color: p.color,
            }),
        }
    }

    fn commit<E>(&mut self, frame: Document, env: &E) -> Vec<RoomEffect>
    where
        E: Environment<Instant = I>,
    {
        self.history.push(frame);
        self.mark_dirty(env);
        self.broadcast_state()
    }

    fn mark_dirty<E>(&mut self, env: &E)
    where
        E: Environment<Instant = I>,
    {
        self.dirty_since = Some(env.now());
        self.revision += 1;
    }

    fn broadcast_state(&self) -> Vec<RoomEffect> {
        vec![RoomEffect::Broadcast {
            to: self.member_ids(),
            message: self.state_update(),
        }]
    }

    fn state_update(&self) -> ServerMessage {
        ServerMessage::StateUpdate {
            document: self.history.current().clone(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    fn members_message(&self) -> ServerMessage {
        ServerMessage::Members {
            members: self.member_ids(),
        }
    }

    fn others(&self, sender: SessionId) -> Vec<SessionId> {
        self.members
            .iter()
            .copied()
            .filter(|&m| m != sender)
            .collect()
    }
}

impl<I> std::fmt::Debug for RoomState<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomState")
            .field("room_id", &self.room_id)
            .field("members", &self.members.len())
            .field("frames", &self.history.frame_count())
            .field("revision", &self.revision)
            .finish()
    }
}
