//! Event router: inbound client messages → room operations.
//!
//! The router validates that a message's claimed room is the sender's current
//! room, invokes the room state machine under the room's lock, and executes
//! the returned effects by enqueueing into session outbound queues. Messages
//! from one session are handled in arrival order by that session's reader
//! task; ordering across sessions is whatever order the room lock grants.

use std::{sync::Arc, time::Duration};

use easel_core::{
    env::Environment,
    room::{RoomEffect, RoomState},
};
use easel_proto::{ClientMessage, CreateElement, RoomId, ServerMessage, SessionId};

use crate::{
    config::ServerConfig,
    persistence::{self, DocumentStore},
    registry::RoomRegistry,
    session::SessionRegistry,
};

/// Routes client messages to room operations and fans out the results.
pub struct Router<E: Environment, S: DocumentStore> {
    env: E,
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomRegistry<E>>,
    store: Arc<S>,
    config: Arc<ServerConfig>,
}

impl<E: Environment, S: DocumentStore> Clone for Router<E, S> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            sessions: Arc::clone(&self.sessions),
            rooms: Arc::clone(&self.rooms),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

impl<E: Environment, S: DocumentStore> Router<E, S> {
    /// Create a router over the shared registries.
    pub fn new(
        env: E,
        sessions: Arc<SessionRegistry>,
        rooms: Arc<RoomRegistry<E>>,
        store: Arc<S>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            env,
            sessions,
            rooms,
            store,
            config,
        }
    }

    /// Handle one inbound message from a session.
    pub async fn handle(&self, session: SessionId, message: ClientMessage) {
        match message {
            ClientMessage::JoinRoom(room_id) => self.join(session, room_id).await,
            ClientMessage::LeaveRoom => self.leave_current(session).await,
            ClientMessage::CreateElement(CreateElement { room_id, element }) => {
                self.with_room(session, &room_id, |state, env| {
                    state.create_element(session, element, env)
                })
                .await;
            }
            ClientMessage::DeleteElement {
                room_id,
                element_id,
            } => {
                self.with_room(session, &room_id, |state, env| {
                    state.delete_element(session, element_id, env)
                })
                .await;
            }
            ClientMessage::Undo(room_id) => {
                self.with_room(session, &room_id, |state, env| state.undo(session, env))
                    .await;
            }
            ClientMessage::Redo(room_id) => {
                self.with_room(session, &room_id, |state, env| state.redo(session, env))
                    .await;
            }
            ClientMessage::CursorMove {
                room_id,
                x,
                y,
                label,
            } => {
                self.with_room(session, &room_id, |state, _| {
                    state.cursor_move(session, x, y, label)
                })
                .await;
            }
            ClientMessage::CursorLeave(room_id) => {
                self.with_room(session, &room_id, |state, _| state.cursor_leave(session))
                    .await;
            }
        }
    }

    /// Disconnect cleanup: unregister the session and leave its room.
    pub async fn handle_disconnect(&self, session: SessionId) {
        let Some(room) = self.sessions.unregister(session) else {
            return;
        };
        if let Some(room_id) = room {
            self.leave_room(session, room_id).await;
        }
    }

    /// Delete notification from the document store: the backing whiteboard is
    /// gone. Members are told and the room is dropped without saving.
    ///
    /// Returns `false` if the room was not live.
    pub async fn notify_deleted(&self, room_id: &RoomId) -> bool {
        let Some(handle) = self.rooms.remove(room_id) else {
            return false;
        };
        let members = { handle.state().lock().await.member_ids() };
        for &member in &members {
            self.sessions.set_room(member, None);
        }
        tracing::info!(room_id = %room_id, members = members.len(), "room deleted by store");
        self.execute(&[RoomEffect::Broadcast {
            to: members,
            message: ServerMessage::RoomDeleted(room_id.clone()),
        }]);
        true
    }

    async fn join(&self, session: SessionId, room_id: RoomId) {
        match self.sessions.current_room(session) {
            Some(previous) if previous != room_id => {
                // A session has at most one room; switching implies leaving.
                self.sessions.set_room(session, None);
                self.leave_room(session, previous).await;
            }
            _ => {}
        }

        let effects = loop {
            let handle = self.rooms.get_or_create(&room_id);
            handle
                .ensure_loaded(self.store.as_ref(), self.config.load_timeout)
                .await;
            let mut state = handle.state().lock().await;
            // The registry only destroys a room while holding its state
            // lock, so a handle still registered here cannot disappear
            // before the member is inserted.
            if !self.rooms.is_registered(&room_id, &handle) {
                drop(state);
                continue;
            }
            break state.join(session);
        };
        self.sessions.set_room(session, Some(room_id.clone()));
        tracing::debug!(session_id = %session, room_id = %room_id, "session joined room");
        self.execute(&effects);
    }

    async fn leave_current(&self, session: SessionId) {
        let Some(room_id) = self.sessions.current_room(session) else {
            return;
        };
        self.sessions.set_room(session, None);
        self.leave_room(session, room_id).await;
    }

    async fn leave_room(&self, session: SessionId, room_id: RoomId) {
        let Some(handle) = self.rooms.get(&room_id) else {
            return;
        };

        let mut final_snapshot = None;
        let effects = {
            let mut state = handle.state().lock().await;
            let effects = state.leave(session);
            if state.is_empty() && self.rooms.remove_registered(&room_id, &handle) {
                if state.is_dirty() && !state.saves_refused() {
                    final_snapshot = Some(state.snapshot().0);
                }
                tracing::info!(room_id = %room_id, "room destroyed (last member left)");
            }
            effects
        };
        self.execute(&effects);

        if let Some(document) = final_snapshot {
            let env = self.env.clone();
            let store = Arc::clone(&self.store);
            let save_timeout = self.config.save_timeout;
            tokio::spawn(async move {
                persistence::save_with_retry(&env, store.as_ref(), &room_id, &document, save_timeout)
                    .await;
            });
        }
    }

    async fn with_room<F>(&self, session: SessionId, claimed: &RoomId, op: F)
    where
        F: FnOnce(&mut RoomState<E::Instant>, &E) -> Vec<RoomEffect>,
    {
        let Some(current) = self.sessions.current_room(session) else {
            tracing::debug!(session_id = %session, "dropping op from session with no room");
            return;
        };
        if &current != claimed {
            tracing::debug!(
                session_id = %session,
                claimed = %claimed,
                current = %current,
                "dropping op for a room the session is not in"
            );
            return;
        }
        let Some(handle) = self.rooms.get(claimed) else {
            tracing::debug!(room_id = %claimed, "dropping op for unknown room");
            return;
        };

        let effects = {
            let mut state = handle.state().lock().await;
            op(&mut state, &self.env)
        };
        self.execute(&effects);
    }

    fn execute(&self, effects: &[RoomEffect]) {
        for effect in effects {
            match effect {
                RoomEffect::Send { to, message } => {
                    self.sessions.deliver(std::slice::from_ref(to), message);
                }
                RoomEffect::Broadcast { to, message } => {
                    self.sessions.deliver(to, message);
                }
            }
        }
    }
}

/// Token bucket over one session's inbound messages.
///
/// Refills continuously at `rate` tokens per second with a burst of twice the
/// sustained rate, so short spurts (a flurry of cursor moves) pass while
/// sustained abuse exhausts the bucket and trips a disconnect.
#[derive(Debug)]
pub struct RateLimiter<I> {
    tokens: f64,
    burst: f64,
    rate: f64,
    last: I,
}

impl<I> RateLimiter<I>
where
    I: Copy + std::ops::Sub<Output = Duration>,
{
    /// Create a full bucket sustaining `rate` messages per second.
    pub fn new(rate: u32, now: I) -> Self {
        let rate = f64::from(rate.max(1));
        Self {
            tokens: rate * 2.0,
            burst: rate * 2.0,
            rate,
            last: now,
        }
    }

    /// Account for one message. Returns `false` when the bucket is empty.
    pub fn allow(&mut self, now: I) -> bool {
        let elapsed = now - self.last;
        self.last = now;
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
