//! End-to-end router flows over in-process sessions.
//!
//! Drives the router with literal wire-format JSON and asserts on the
//! messages each session's outbound queue receives, covering the two-client
//! ink, shared undo, redo-tail discard, presence, slow-client shedding, and
//! delete-notification flows.

use std::sync::Arc;

use easel_proto::{ClientMessage, Document, ElementId, Point, ServerMessage, SessionId, Text};
use easel_server::{
    DisconnectReason, RoomRegistry, Router, ServerConfig, SessionRegistry, SystemEnv,
    persistence::{DocumentStore, MemoryStore},
};
use tokio::sync::{mpsc, watch};

struct Harness<S: DocumentStore> {
    router: Router<SystemEnv, S>,
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomRegistry<SystemEnv>>,
}

fn harness_with<S: DocumentStore>(store: S) -> Harness<S> {
    let config = Arc::new(ServerConfig::default());
    let sessions = Arc::new(SessionRegistry::new());
    let rooms = Arc::new(RoomRegistry::new(config.history_cap));
    let router = Router::new(
        SystemEnv::new(),
        Arc::clone(&sessions),
        Arc::clone(&rooms),
        Arc::new(store),
        config,
    );
    Harness {
        router,
        sessions,
        rooms,
    }
}

fn harness() -> Harness<MemoryStore> {
    harness_with(MemoryStore::new())
}

struct TestClient {
    id: SessionId,
    rx: mpsc::Receiver<String>,
    shutdown: watch::Receiver<Option<DisconnectReason>>,
}

impl TestClient {
    fn recv(&mut self) -> ServerMessage {
        let json = self.rx.try_recv().expect("expected a queued message");
        ServerMessage::from_json(&json).expect("valid server message")
    }

    fn try_recv(&mut self) -> Option<ServerMessage> {
        self.rx
            .try_recv()
            .ok()
            .map(|json| ServerMessage::from_json(&json).expect("valid server message"))
    }

    fn drain(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }

    fn disconnect_reason(&self) -> Option<DisconnectReason> {
        *self.shutdown.borrow()
    }
}

impl<S: DocumentStore> Harness<S> {
    fn connect(&self, queue: usize) -> TestClient {
        let (tx, rx) = mpsc::channel(queue);
        let (shutdown_tx, shutdown_rx) = watch::channel(None);
        let id = self.sessions.register(None, tx, shutdown_tx);
        TestClient {
            id,
            rx,
            shutdown: shutdown_rx,
        }
    }

    async fn send(&self, client: &TestClient, json: &str) {
        let message = ClientMessage::from_json(json).expect("valid client message");
        self.router.handle(client.id, message).await;
    }
}

fn expect_state_update(message: ServerMessage) -> (Document, bool, bool) {
    match message {
        ServerMessage::StateUpdate {
            document,
            can_undo,
            can_redo,
        } => (document, can_undo, can_redo),
        other => panic!("expected state-update, got {other:?}"),
    }
}

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

const CREATE_RECT: &str = r##"{
    "kind": "create-element",
    "data": {
        "room_id": "r1",
        "type": "shape",
        "payload": {
            "kind": "rectangle",
            "start": [10, 10],
            "end": [20, 20],
            "color": "#000",
            "stroke_width": 1
        }
    }
}"##;

#[tokio::test]
async fn two_client_ink() {
    let harness = harness();
    let mut s1 = harness.connect(64);
    let mut s2 = harness.connect(64);

    harness.send(&s1, r#"{"kind":"join-room","data":"r1"}"#).await;
    let (document, can_undo, can_redo) = expect_state_update(s1.recv());
    assert!(document.is_empty());
    assert!(!can_undo);
    assert!(!can_redo);

    harness.send(&s2, r#"{"kind":"join-room","data":"r1"}"#).await;
    s1.drain();
    s2.drain();

    harness.send(&s1, CREATE_LINE).await;

    let s1_id = s1.id;
    for client in [&mut s1, &mut s2] {
        let (document, can_undo, can_redo) = expect_state_update(client.recv());
        assert_eq!(document.strokes.len(), 1);
        assert_eq!(document.shapes.len() + document.texts.len(), 0);
        let stroke = &document.strokes[0];
        assert_eq!(stroke.author, s1_id);
        assert!(stroke.id > ElementId(0));
        assert_eq!(stroke.points, vec![Point(0.0, 0.0), Point(1.0, 1.0)]);
        assert!(can_undo);
        assert!(!can_redo);
        assert!(client.try_recv().is_none());
    }
}

#[tokio::test]
async fn undo_across_sessions_then_redo_tail_discard() {
    let harness = harness();
    let mut s1 = harness.connect(64);
    let mut s2 = harness.connect(64);
    harness.send(&s1, r#"{"kind":"join-room","data":"r1"}"#).await;
    harness.send(&s2, r#"{"kind":"join-room","data":"r1"}"#).await;
    harness.send(&s1, CREATE_LINE).await;
    s1.drain();
    s2.drain();

    // S2 undoes S1's stroke: both converge on the empty document.
    harness.send(&s2, r#"{"kind":"undo","data":"r1"}"#).await;
    for client in [&mut s1, &mut s2] {
        let (document, can_undo, can_redo) = expect_state_update(client.recv());
        assert!(document.is_empty());
        assert!(!can_undo);
        assert!(can_redo);
    }

    // A new mutation discards the redo tail: the stroke is gone forever.
    harness.send(&s1, CREATE_RECT).await;
    for client in [&mut s1, &mut s2] {
        let (document, can_undo, can_redo) = expect_state_update(client.recv());
        assert!(document.strokes.is_empty());
        assert_eq!(document.shapes.len(), 1);
        assert!(can_undo);
        assert!(!can_redo);
    }

    harness.send(&s2, r#"{"kind":"redo","data":"r1"}"#).await;
    assert!(s1.try_recv().is_none());
    assert!(s2.try_recv().is_none());
}

#[tokio::test]
async fn join_broadcasts_membership() {
    let harness = harness();
    let mut s1 = harness.connect(64);
    let s2 = harness.connect(64);

    harness.send(&s1, r#"{"kind":"join-room","data":"r1"}"#).await;
    expect_state_update(s1.recv());
    assert_eq!(
        s1.recv(),
        ServerMessage::Members {
            members: vec![s1.id]
        }
    );

    harness.send(&s2, r#"{"kind":"join-room","data":"r1"}"#).await;
    assert_eq!(
        s1.recv(),
        ServerMessage::Members {
            members: vec![s1.id, s2.id]
        }
    );

    harness.send(&s2, r#"{"kind":"leave-room"}"#).await;
    assert_eq!(
        s1.recv(),
        ServerMessage::Members {
            members: vec![s1.id]
        }
    );
    assert_eq!(harness.rooms.count(), 1);

    // The last leave destroys the room.
    harness.send(&s1, r#"{"kind":"leave-room"}"#).await;
    assert_eq!(harness.rooms.count(), 0);
}

#[tokio::test]
async fn mutations_for_other_rooms_are_dropped() {
    let harness = harness();
    let mut s1 = harness.connect(64);
    let mut s2 = harness.connect(64);

    // Before joining anything, mutations go nowhere.
    harness.send(&s1, CREATE_LINE).await;
    assert!(s1.try_recv().is_none());
    assert_eq!(harness.rooms.count(), 0);

    harness.send(&s1, r#"{"kind":"join-room","data":"r1"}"#).await;
    harness.send(&s2, r#"{"kind":"join-room","data":"other"}"#).await;
    s1.drain();
    s2.drain();

    // S2 claims room "r1" but is a member of "other": dropped silently.
    harness.send(&s2, CREATE_LINE).await;
    assert!(s1.try_recv().is_none());
    assert!(s2.try_recv().is_none());
}

#[tokio::test]
async fn presence_reaches_others_only() {
    let harness = harness();
    let mut s1 = harness.connect(64);
    let mut s2 = harness.connect(64);
    harness.send(&s1, r#"{"kind":"join-room","data":"r1"}"#).await;
    harness.send(&s2, r#"{"kind":"join-room","data":"r1"}"#).await;
    s1.drain();
    s2.drain();

    harness
        .send(
            &s1,
            r#"{"kind":"cursor-move","data":{"room_id":"r1","x":4.5,"y":6.0,"label":"ana"}}"#,
        )
        .await;
    assert_eq!(
        s2.recv(),
        ServerMessage::RemoteCursor {
            session_id: s1.id,
            x: 4.5,
            y: 6.0,
            label: "ana".to_string(),
        }
    );
    assert!(s1.try_recv().is_none());

    harness.send(&s1, r#"{"kind":"cursor-leave","data":"r1"}"#).await;
    assert_eq!(
        s2.recv(),
        ServerMessage::RemoteCursorLeave { session_id: s1.id }
    );
    assert!(s1.try_recv().is_none());
}

#[tokio::test]
async fn slow_client_is_shed_without_stalling_the_room() {
    let harness = harness();
    let mut s1 = harness.connect(64);
    let mut s2 = harness.connect(64);
    let s3 = harness.connect(4);

    for client in [&s1, &s2, &s3] {
        harness.send(client, r#"{"kind":"join-room","data":"r1"}"#).await;
    }
    s1.drain();
    s2.drain();
    // S3 never drains: its queue holds the join snapshot + member lists.

    for _ in 0..4 {
        harness.send(&s1, CREATE_LINE).await;
    }

    assert_eq!(s3.disconnect_reason(), Some(DisconnectReason::QueueOverflow));
    assert_eq!(s1.disconnect_reason(), None);
    assert_eq!(s2.disconnect_reason(), None);

    // The transport teardown follows the shutdown signal.
    harness.router.handle_disconnect(s3.id).await;
    s1.drain();
    s2.drain();

    // The surviving members keep exchanging mutations.
    harness.send(&s2, CREATE_LINE).await;
    let (document, _, _) = expect_state_update(s1.recv());
    assert_eq!(document.strokes.len(), 5);
}

#[tokio::test]
async fn cold_load_seeds_the_first_snapshot() {
    let store = MemoryStore::new();
    let seeded = Document {
        strokes: vec![],
        shapes: vec![],
        texts: vec![Text {
            id: ElementId(9),
            author: SessionId(77),
            created_at: 3,
            anchor: Point(1.0, 2.0),
            content: "welcome".to_string(),
            font_size: 14.0,
            font_family: "sans-serif".to_string(),
            color: "#222".to_string(),
        }],
    };
    store.insert("r2".parse().expect("valid id"), seeded.clone());
    let harness = harness_with(store);

    let mut s1 = harness.connect(64);
    harness.send(&s1, r#"{"kind":"join-room","data":"r2"}"#).await;
    let (document, can_undo, can_redo) = expect_state_update(s1.recv());
    assert_eq!(document, seeded);
    // The loaded baseline is the floor of the history stack.
    assert!(!can_undo);
    assert!(!can_redo);
}

#[tokio::test]
async fn delete_notification_evicts_the_room() {
    let harness = harness();
    let mut s1 = harness.connect(64);
    let mut s2 = harness.connect(64);
    harness.send(&s1, r#"{"kind":"join-room","data":"r1"}"#).await;
    harness.send(&s2, r#"{"kind":"join-room","data":"r1"}"#).await;
    s1.drain();
    s2.drain();

    let room_id = "r1".parse().expect("valid id");
    assert!(harness.router.notify_deleted(&room_id).await);
    for client in [&mut s1, &mut s2] {
        assert_eq!(client.recv(), ServerMessage::RoomDeleted(room_id.clone()));
    }
    assert_eq!(harness.rooms.count(), 0);

    // Members lost their room binding; further mutations are dropped.
    harness.send(&s1, CREATE_LINE).await;
    assert!(s1.try_recv().is_none());

    // Deleting a room that is not live reports not-found.
    assert!(!harness.router.notify_deleted(&room_id).await);
}

#[tokio::test]
async fn joining_a_second_room_leaves_the_first() {
    let harness = harness();
    let mut s1 = harness.connect(64);
    let mut s2 = harness.connect(64);
    harness.send(&s1, r#"{"kind":"join-room","data":"r1"}"#).await;
    harness.send(&s2, r#"{"kind":"join-room","data":"r1"}"#).await;
    s1.drain();
    s2.drain();

    harness.send(&s2, r#"{"kind":"join-room","data":"r2"}"#).await;
    assert_eq!(
        s1.recv(),
        ServerMessage::Members {
            members: vec![s1.id]
        }
    );
    assert_eq!(harness.rooms.count(), 2);
    assert_eq!(
        harness.sessions.current_room(s2.id),
        Some("r2".parse().expect("valid id"))
    );
}
