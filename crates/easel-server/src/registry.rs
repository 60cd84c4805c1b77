//! Room registry: room id → live room.
//!
//! Rooms are created on demand when the first session joins and destroyed
//! when the last member leaves. The registry lock is held only for map
//! lookup/insert, never during room operations; each room serializes its own
//! operations behind a per-room async mutex.
//!
//! Destroy-vs-join race: the registry only removes a room while the caller
//! holds that room's state lock ([`RoomRegistry::remove_registered`]), so a
//! joiner that locks a handle's state and still finds it registered
//! ([`RoomRegistry::is_registered`]) can safely join; otherwise it retries
//! with a fresh handle.

#![allow(clippy::expect_used, reason = "Poisoned registry lock is unrecoverable")]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use easel_core::{env::Environment, ids::ElementIdAllocator, room::RoomState};
use easel_proto::RoomId;
use tokio::sync::OnceCell;

use crate::persistence::DocumentStore;

/// One live room: its state behind an exclusive lock, plus runtime flags.
pub struct RoomHandle<E: Environment> {
    room_id: RoomId,
    state: tokio::sync::Mutex<RoomState<E::Instant>>,
    /// Single-flight cold load; concurrent joiners await the one load.
    loaded: OnceCell<()>,
    /// At most one save per room is in flight at a time.
    save_in_flight: AtomicBool,
}

impl<E: Environment> RoomHandle<E> {
    fn new(room_id: RoomId, ids: ElementIdAllocator, history_cap: usize) -> Self {
        Self {
            state: tokio::sync::Mutex::new(RoomState::new(room_id.clone(), ids, history_cap)),
            room_id,
            loaded: OnceCell::new(),
            save_in_flight: AtomicBool::new(false),
        }
    }

    /// The room's id.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// The room's state lock.
    pub fn state(&self) -> &tokio::sync::Mutex<RoomState<E::Instant>> {
        &self.state
    }

    /// Perform the cold load exactly once; later callers await its completion.
    ///
    /// A load error or timeout leaves the room empty and marks it
    /// load-failed, which refuses all saves for the room's lifetime so a
    /// fresh save cannot overwrite data that may still exist in the store.
    pub async fn ensure_loaded<S>(&self, store: &S, load_timeout: Duration)
    where
        S: DocumentStore + ?Sized,
    {
        self.loaded
            .get_or_init(|| async {
                match tokio::time::timeout(load_timeout, store.load(&self.room_id)).await {
                    Ok(Ok(Some(document))) => {
                        tracing::info!(
                            room_id = %self.room_id,
                            elements = document.element_count(),
                            "cold load complete"
                        );
                        self.state.lock().await.seed(document);
                    }
                    Ok(Ok(None)) => {
                        tracing::debug!(
                            room_id = %self.room_id,
                            "no persisted document; starting empty"
                        );
                    }
                    Ok(Err(error)) => {
                        tracing::error!(
                            room_id = %self.room_id,
                            %error,
                            "cold load failed; saves refused for this room"
                        );
                        self.state.lock().await.mark_load_failed();
                    }
                    Err(_) => {
                        tracing::error!(
                            room_id = %self.room_id,
                            "cold load timed out; saves refused for this room"
                        );
                        self.state.lock().await.mark_load_failed();
                    }
                }
            })
            .await;
    }

    /// Claim the room's save slot. Returns `false` if a save is in flight.
    pub fn begin_save(&self) -> bool {
        !self.save_in_flight.swap(true, Ordering::Relaxed)
    }

    /// Release the room's save slot.
    pub fn finish_save(&self) {
        self.save_in_flight.store(false, Ordering::Relaxed);
    }

    /// Whether a save is currently in flight.
    pub fn save_in_flight(&self) -> bool {
        self.save_in_flight.load(Ordering::Relaxed)
    }
}

/// Registry of live rooms.
pub struct RoomRegistry<E: Environment> {
    rooms: Mutex<HashMap<RoomId, Arc<RoomHandle<E>>>>,
    /// Shared across rooms so element ids are process-unique.
    ids: ElementIdAllocator,
    history_cap: usize,
}

impl<E: Environment> RoomRegistry<E> {
    /// Create an empty registry.
    pub fn new(history_cap: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            ids: ElementIdAllocator::new(),
            history_cap,
        }
    }

    /// The live room for `room_id`, if any.
    pub fn get(&self, room_id: &RoomId) -> Option<Arc<RoomHandle<E>>> {
        self.rooms
            .lock()
            .expect("registry lock poisoned")
            .get(room_id)
            .cloned()
    }

    /// The live room for `room_id`, instantiating it if absent.
    ///
    /// Concurrent calls for the same id return the same handle. The caller
    /// drives the cold load via [`RoomHandle::ensure_loaded`].
    pub fn get_or_create(&self, room_id: &RoomId) -> Arc<RoomHandle<E>> {
        let mut rooms = self.rooms.lock().expect("registry lock poisoned");
        if let Some(handle) = rooms.get(room_id) {
            return Arc::clone(handle);
        }
        let handle = Arc::new(RoomHandle::new(
            room_id.clone(),
            self.ids.clone(),
            self.history_cap,
        ));
        rooms.insert(room_id.clone(), Arc::clone(&handle));
        tracing::info!(room_id = %room_id, "room created");
        handle
    }

    /// Whether `handle` is still the registered room for `room_id`.
    pub fn is_registered(&self, room_id: &RoomId, handle: &Arc<RoomHandle<E>>) -> bool {
        self.rooms
            .lock()
            .expect("registry lock poisoned")
            .get(room_id)
            .is_some_and(|registered| Arc::ptr_eq(registered, handle))
    }

    /// Remove `handle` from the registry if it is still the registered room.
    ///
    /// The caller must hold `handle`'s state lock; that is what makes the
    /// emptiness check and the removal atomic with respect to joiners.
    pub fn remove_registered(&self, room_id: &RoomId, handle: &Arc<RoomHandle<E>>) -> bool {
        let mut rooms = self.rooms.lock().expect("registry lock poisoned");
        if rooms
            .get(room_id)
            .is_some_and(|registered| Arc::ptr_eq(registered, handle))
        {
            rooms.remove(room_id);
            true
        } else {
            false
        }
    }

    /// Remove a room unconditionally (delete notification path).
    pub fn remove(&self, room_id: &RoomId) -> Option<Arc<RoomHandle<E>>> {
        self.rooms
            .lock()
            .expect("registry lock poisoned")
            .remove(room_id)
    }

    /// Handles of every live room.
    pub fn snapshot(&self) -> Vec<Arc<RoomHandle<E>>> {
        self.rooms
            .lock()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Number of live rooms.
    pub fn count(&self) -> usize {
        self.rooms.lock().expect("registry lock poisoned").len()
    }
}
