//! Connected-session registry and outbound delivery.
//!
//! Each websocket connection registers here and receives a server-assigned
//! sequential id. Outbound delivery is non-blocking: messages are enqueued
//! into the session's bounded queue, and a session whose queue overflows is
//! shed (force-disconnected) rather than ever stalling a room on a slow
//! client. The queue is single-producer from the router's perspective and
//! single-consumer by the transport writer task.

#![allow(clippy::expect_used, reason = "Poisoned session lock is unrecoverable")]

use std::{
    collections::HashMap,
    fmt,
    sync::{
        RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use easel_proto::{RoomId, ServerMessage, SessionId};
use tokio::sync::{mpsc, watch};

/// Why a session is being force-disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The session's outbound queue overflowed (slow consumer).
    QueueOverflow,
    /// The session exceeded the inbound rate limit.
    RateLimited,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueOverflow => f.write_str("outbound queue overflow"),
            Self::RateLimited => f.write_str("inbound rate limit exceeded"),
        }
    }
}

/// One connected client's bookkeeping.
struct SessionEntry {
    /// Opaque user handle from the auth collaborator; `None` is anonymous.
    identity: Option<String>,
    /// The session's current room, at most one.
    room: Option<RoomId>,
    /// Bounded outbound queue of serialized messages.
    outbound: mpsc::Sender<String>,
    /// Signal observed by the session's reader and writer tasks.
    shutdown: watch::Sender<Option<DisconnectReason>>,
}

/// Registry of connected sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry. Session ids start at 1.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new session and assign its id.
    pub fn register(
        &self,
        identity: Option<String>,
        outbound: mpsc::Sender<String>,
        shutdown: watch::Sender<Option<DisconnectReason>>,
    ) -> SessionId {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = SessionEntry {
            identity,
            room: None,
            outbound,
            shutdown,
        };
        self.sessions
            .write()
            .expect("session lock poisoned")
            .insert(id, entry);
        id
    }

    /// Remove a session, returning the room it was in (if any).
    ///
    /// Returns `None` if the session was not registered.
    pub fn unregister(&self, id: SessionId) -> Option<Option<RoomId>> {
        let entry = self
            .sessions
            .write()
            .expect("session lock poisoned")
            .remove(&id)?;
        tracing::debug!(
            session_id = %id,
            identity = entry.identity.as_deref().unwrap_or("anonymous"),
            "session unregistered"
        );
        Some(entry.room)
    }

    /// The session's current room, if any.
    pub fn current_room(&self, id: SessionId) -> Option<RoomId> {
        self.sessions
            .read()
            .expect("session lock poisoned")
            .get(&id)
            .and_then(|entry| entry.room.clone())
    }

    /// Set or clear the session's current room.
    ///
    /// Returns `false` if the session is not registered.
    pub fn set_room(&self, id: SessionId, room: Option<RoomId>) -> bool {
        let mut sessions = self.sessions.write().expect("session lock poisoned");
        match sessions.get_mut(&id) {
            Some(entry) => {
                entry.room = room;
                true
            }
            None => false,
        }
    }

    /// Enqueue a message to every session in `to`.
    ///
    /// The message is serialized once. A full queue sheds that session only:
    /// its shutdown signal fires and its connection tasks tear the session
    /// down; other recipients and the room itself are unaffected.
    pub fn deliver(&self, to: &[SessionId], message: &ServerMessage) {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(error) => {
                tracing::error!(%error, "failed to encode outbound message");
                return;
            }
        };

        let sessions = self.sessions.read().expect("session lock poisoned");
        for id in to {
            let Some(entry) = sessions.get(id) else {
                continue;
            };
            match entry.outbound.try_send(json.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(session_id = %id, "outbound queue overflow; shedding session");
                    entry.shutdown.send(Some(DisconnectReason::QueueOverflow)).ok();
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Writer already gone; disconnect cleanup will follow.
                }
            }
        }
    }

    /// Force-disconnect a session.
    ///
    /// Returns `false` if the session is not registered.
    pub fn kill(&self, id: SessionId, reason: DisconnectReason) -> bool {
        let sessions = self.sessions.read().expect("session lock poisoned");
        match sessions.get(&id) {
            Some(entry) => {
                entry.shutdown.send(Some(reason)).ok();
                true
            }
            None => false,
        }
    }

    /// Number of connected sessions.
    pub fn count(&self) -> usize {
        self.sessions.read().expect("session lock poisoned").len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
