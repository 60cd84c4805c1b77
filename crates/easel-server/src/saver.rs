//! Periodic persistence: scans rooms and saves dirty snapshots.
//!
//! A single tick task runs every `save_interval`. Any dirty room with no save
//! in flight snapshots its current frame under the room lock and writes it
//! outside the lock, so persistence never blocks room operations. At most one
//! save per room is in flight; if the document changes while a save runs, the
//! room stays dirty and the next tick picks up the newer snapshot.

use std::sync::Arc;

use easel_core::env::Environment;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    config::ServerConfig,
    persistence::{self, DocumentStore},
    registry::{RoomHandle, RoomRegistry},
};

/// The persistence tick driver.
pub struct Saver<E: Environment, S: DocumentStore> {
    env: E,
    rooms: Arc<RoomRegistry<E>>,
    store: Arc<S>,
    config: Arc<ServerConfig>,
}

impl<E: Environment, S: DocumentStore> Saver<E, S> {
    /// Create a saver over the given registry and store.
    pub fn new(
        env: E,
        rooms: Arc<RoomRegistry<E>>,
        store: Arc<S>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            env,
            rooms,
            store,
            config,
        }
    }

    /// Run the periodic tick until the process exits.
    pub async fn run(self) {
        let mut tick = tokio::time::interval(self.config.save_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            self.flush_once().await;
        }
    }

    /// One scan over all rooms. Returns the spawned save tasks so tests can
    /// await their completion.
    pub async fn flush_once(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        for handle in self.rooms.snapshot() {
            if let Some(task) = self.maybe_save(handle).await {
                tasks.push(task);
            }
        }
        tasks
    }

    async fn maybe_save(&self, handle: Arc<RoomHandle<E>>) -> Option<JoinHandle<()>> {
        if handle.save_in_flight() {
            return None;
        }

        let (document, revision) = {
            let state = handle.state().lock().await;
            if !state.is_dirty() || state.saves_refused() {
                return None;
            }
            state.snapshot()
        };

        if !handle.begin_save() {
            return None;
        }

        let env = self.env.clone();
        let store = Arc::clone(&self.store);
        let save_timeout = self.config.save_timeout;
        Some(tokio::spawn(async move {
            persistence::save_with_retry(
                &env,
                store.as_ref(),
                handle.room_id(),
                &document,
                save_timeout,
            )
            .await;

            // Success clears the dirty marker for this snapshot's revision.
            // Retry exhaustion clears it too: the next mutation, not the next
            // tick, schedules the next attempt. Room state is never rolled
            // back either way.
            let mut state = handle.state().lock().await;
            state.mark_saved(revision);
            drop(state);
            handle.finish_save();
        }))
    }
}
