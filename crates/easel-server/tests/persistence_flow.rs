//! Cold-load / warm-save flows: debounce, coalescing, retries, refusal.
//!
//! Runs under Tokio's paused clock so the backoff ladder and save timers
//! execute deterministically in zero wall time.

use std::{sync::Arc, time::Duration};

use easel_proto::{ClientMessage, RoomId, SessionId};
use easel_server::{
    DisconnectReason, RoomRegistry, Router, Saver, ServerConfig, SessionRegistry, SystemEnv,
    persistence::{ChaoticStore, DocumentStore, MemoryStore},
};
use tokio::sync::{mpsc, watch};

struct Harness<S: DocumentStore> {
    router: Router<SystemEnv, S>,
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomRegistry<SystemEnv>>,
    store: Arc<S>,
    saver: Saver<SystemEnv, S>,
}

fn harness_with<S: DocumentStore>(store: S) -> Harness<S> {
    let config = Arc::new(ServerConfig::default());
    let sessions = Arc::new(SessionRegistry::new());
    let rooms = Arc::new(RoomRegistry::new(config.history_cap));
    let store = Arc::new(store);
    let env = SystemEnv::new();
    let router = Router::new(
        env.clone(),
        Arc::clone(&sessions),
        Arc::clone(&rooms),
        Arc::clone(&store),
        Arc::clone(&config),
    );
    let saver = Saver::new(env, Arc::clone(&rooms), Arc::clone(&store), config);
    Harness {
        router,
        sessions,
        rooms,
        store,
        saver,
    }
}

impl<S: DocumentStore> Harness<S> {
    fn connect(&self) -> (SessionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(256);
        let (shutdown_tx, _shutdown_rx) = watch::channel(None::<DisconnectReason>);
        let id = self.sessions.register(None, tx, shutdown_tx);
        (id, rx)
    }

    async fn send(&self, session: SessionId, json: &str) {
        let message = ClientMessage::from_json(json).expect("valid client message");
        self.router.handle(session, message).await;
    }

    /// Run one persistence tick and wait for every spawned save to finish.
    async fn flush(&self) -> usize {
        let tasks = self.saver.flush_once().await;
        let count = tasks.len();
        for task in tasks {
            task.await.expect("save task panicked");
        }
        count
    }
}

fn room_id() -> RoomId {
    "r1".parse().expect("valid id")
}

const JOIN: &str = r#"{"kind":"join-room","data":"r1"}"#;
const CREATE_LINE: &str = r##"{
    "kind": "create-element",
    "data": {
        "room_id": "r1",
        "type": "line",
        "payload": {
            "points": [[0, 0], [1, 1]],
            "color": "#000",
            "stroke_width": 2,
            "mode": "ink"
        }
    }
}"##;

#[tokio::test(start_paused = true)]
async fn warm_save_follows_a_mutation() {
    let harness = harness_with(MemoryStore::new());
    let (s1, _rx) = harness.connect();
    harness.send(s1, JOIN).await;
    harness.send(s1, CREATE_LINE).await;

    assert_eq!(harness.flush().await, 1);

    let saved = harness.store.get(&room_id()).expect("document saved");
    assert_eq!(saved.strokes.len(), 1);
    assert_eq!(harness.store.save_count(), 1);

    // Nothing changed since; the next tick is a no-op.
    assert_eq!(harness.flush().await, 0);
    assert_eq!(harness.store.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn undo_marks_the_room_dirty_again() {
    let harness = harness_with(MemoryStore::new());
    let (s1, _rx) = harness.connect();
    harness.send(s1, JOIN).await;
    harness.send(s1, CREATE_LINE).await;
    assert_eq!(harness.flush().await, 1);

    harness.send(s1, r#"{"kind":"undo","data":"r1"}"#).await;
    assert_eq!(harness.flush().await, 1);

    let saved = harness.store.get(&room_id()).expect("document saved");
    assert!(saved.strokes.is_empty());
}

#[tokio::test(start_paused = true)]
async fn at_most_one_save_per_room_is_in_flight() {
    let harness = harness_with(MemoryStore::new());
    let (s1, _rx) = harness.connect();
    harness.send(s1, JOIN).await;
    harness.send(s1, CREATE_LINE).await;

    let handle = harness.rooms.get(&room_id()).expect("room live");
    // Simulate an in-flight save holding the room's save slot.
    assert!(handle.begin_save());
    assert_eq!(harness.flush().await, 0);

    // Once the in-flight save resolves, the next tick picks up the newest
    // snapshot.
    handle.finish_save();
    harness.send(s1, CREATE_LINE).await;
    assert_eq!(harness.flush().await, 1);
    let saved = harness.store.get(&room_id()).expect("document saved");
    assert_eq!(saved.strokes.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_save_failures_are_retried_with_backoff() {
    let harness = harness_with(ChaoticStore::new(MemoryStore::new()));
    harness.store.fail_next_saves(2);
    let (s1, _rx) = harness.connect();
    harness.send(s1, JOIN).await;
    harness.send(s1, CREATE_LINE).await;

    assert_eq!(harness.flush().await, 1);

    assert_eq!(harness.store.save_attempts(), 3);
    assert!(harness.store.inner().get(&room_id()).is_some());
}

#[tokio::test(start_paused = true)]
async fn retry_exhaustion_defers_to_the_next_mutation() {
    let harness = harness_with(ChaoticStore::new(MemoryStore::new()));
    harness.store.fail_next_saves(5);
    let (s1, _rx) = harness.connect();
    harness.send(s1, JOIN).await;
    harness.send(s1, CREATE_LINE).await;

    // Initial attempt plus four retries, all failing; the room keeps
    // operating and the snapshot is abandoned.
    assert_eq!(harness.flush().await, 1);
    assert_eq!(harness.store.save_attempts(), 5);
    assert!(harness.store.inner().get(&room_id()).is_none());

    // No further ticks retry on their own.
    assert_eq!(harness.flush().await, 0);

    // The next mutation schedules another save, which now succeeds.
    harness.send(s1, CREATE_LINE).await;
    assert_eq!(harness.flush().await, 1);
    assert_eq!(harness.store.save_attempts(), 6);
    let saved = harness.store.inner().get(&room_id()).expect("document saved");
    assert_eq!(saved.strokes.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_cold_load_refuses_saves() {
    let harness = harness_with(ChaoticStore::new(MemoryStore::new()));
    harness.store.set_fail_loads(true);
    let (s1, _rx) = harness.connect();
    harness.send(s1, JOIN).await;
    harness.send(s1, CREATE_LINE).await;

    // The room operates on an empty baseline, but nothing is ever saved:
    // the store may still hold data this process failed to read.
    assert_eq!(harness.flush().await, 0);
    assert_eq!(harness.store.save_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn last_leave_schedules_a_final_save() {
    let harness = harness_with(MemoryStore::new());
    let (s1, _rx) = harness.connect();
    harness.send(s1, JOIN).await;
    harness.send(s1, CREATE_LINE).await;
    harness.send(s1, r#"{"kind":"leave-room"}"#).await;

    assert_eq!(harness.rooms.count(), 0);

    // Let the detached final-save task run to completion.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let saved = harness.store.get(&room_id()).expect("final save landed");
    assert_eq!(saved.strokes.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn clean_rooms_are_not_saved_on_destroy() {
    let harness = harness_with(MemoryStore::new());
    let (s1, _rx) = harness.connect();
    harness.send(s1, JOIN).await;
    harness.send(s1, CREATE_LINE).await;
    assert_eq!(harness.flush().await, 1);

    harness.send(s1, r#"{"kind":"leave-room"}"#).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    // Already persisted before the leave; no extra save fired.
    assert_eq!(harness.store.save_count(), 1);
}
