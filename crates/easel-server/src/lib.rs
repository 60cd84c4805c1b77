//! Easel realtime collaboration server.
//!
//! Production runtime wrapping the core crate's action-based room logic with
//! real I/O: axum websocket transport, per-session outbound queues, the
//! periodic persistence tick, and a small HTTP surface (`GET /health`, the
//! internal delete-notification route).
//!
//! # Components
//!
//! - [`Router`]: maps inbound client messages to room operations and executes
//!   the returned effects (pure logic lives in `easel-core`).
//! - [`SessionRegistry`]: connected clients and their bounded outbound queues.
//! - [`RoomRegistry`]: room id → live room, created on first join, destroyed
//!   when the last member leaves.
//! - [`Saver`]: debounced warm-save loop over dirty rooms.
//! - [`persistence`]: the document-store adapter (HTTP in production).
//! - [`SystemEnv`]: production environment (real time, Tokio sleeps).

#![forbid(unsafe_code)]

mod config;
mod error;
pub mod persistence;
mod registry;
mod router;
mod saver;
mod session;
mod system_env;

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
pub use config::ServerConfig;
use easel_core::env::Environment;
use easel_proto::{ClientMessage, RoomId, SessionId};
pub use error::ServerError;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use persistence::DocumentStore;
pub use registry::{RoomHandle, RoomRegistry};
pub use router::{RateLimiter, Router};
pub use saver::Saver;
use serde::{Deserialize, Serialize};
pub use session::{DisconnectReason, SessionRegistry};
pub use system_env::SystemEnv;
use tokio::sync::{mpsc, watch};

/// Shared state handed to every request handler.
struct AppState<E: Environment, S: DocumentStore> {
    env: E,
    config: Arc<ServerConfig>,
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomRegistry<E>>,
    store: Arc<S>,
    router: Router<E, S>,
}

impl<E: Environment, S: DocumentStore> Clone for AppState<E, S> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            config: Arc::clone(&self.config),
            sessions: Arc::clone(&self.sessions),
            rooms: Arc::clone(&self.rooms),
            store: Arc::clone(&self.store),
            router: self.router.clone(),
        }
    }
}

/// Production easel server: websocket listener plus the persistence tick.
pub struct Server<S: DocumentStore> {
    listener: tokio::net::TcpListener,
    state: AppState<SystemEnv, S>,
}

impl<S: DocumentStore> Server<S> {
    /// Bind the listener and assemble the runtime around `store`.
    pub async fn bind(config: ServerConfig, store: S) -> Result<Self, ServerError> {
        let listener = tokio::net::TcpListener::bind(&config.bind_address)
            .await
            .map_err(|e| {
                ServerError::Transport(format!("failed to bind {}: {e}", config.bind_address))
            })?;

        let env = SystemEnv::new();
        let config = Arc::new(config);
        let sessions = Arc::new(SessionRegistry::new());
        let rooms = Arc::new(RoomRegistry::new(config.history_cap));
        let store = Arc::new(store);
        let router = Router::new(
            env.clone(),
            Arc::clone(&sessions),
            Arc::clone(&rooms),
            Arc::clone(&store),
            Arc::clone(&config),
        );

        Ok(Self {
            listener,
            state: AppState {
                env,
                config,
                sessions,
                rooms,
                store,
                router,
            },
        })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the process exits or the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let saver = Saver::new(
            self.state.env.clone(),
            Arc::clone(&self.state.rooms),
            Arc::clone(&self.state.store),
            Arc::clone(&self.state.config),
        );
        tokio::spawn(saver.run());

        let app = routes(self.state);
        axum::serve(self.listener, app)
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))
    }
}

fn routes<E: Environment, S: DocumentStore>(state: AppState<E, S>) -> axum::Router {
    axum::Router::new()
        .route("/ws", get(ws_handler::<E, S>))
        .route("/health", get(health::<E, S>))
        .route("/internal/rooms/{room_id}", delete(room_deleted::<E, S>))
        .with_state(state)
}

/// Query parameters accepted at websocket upgrade time.
#[derive(Debug, Deserialize)]
struct ConnectParams {
    /// Opaque user handle from the auth collaborator; absent is anonymous.
    identity: Option<String>,
}

async fn ws_handler<E: Environment, S: DocumentStore>(
    State(state): State<AppState<E, S>>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.config.allowed_origins.is_empty() {
        let origin = headers
            .get(header::ORIGIN)
            .and_then(|value| value.to_str().ok());
        let allowed = origin.is_some_and(|origin| {
            state
                .config
                .allowed_origins
                .iter()
                .any(|candidate| candidate == origin)
        });
        if !allowed {
            tracing::warn!(origin = origin.unwrap_or("<none>"), "rejecting origin");
            return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
        }
    }

    ws.on_upgrade(move |socket| client_connection(state, socket, params.identity))
}

async fn client_connection<E: Environment, S: DocumentStore>(
    state: AppState<E, S>,
    socket: WebSocket,
    identity: Option<String>,
) {
    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(state.config.outbound_queue);
    let (shutdown_tx, shutdown_rx) = watch::channel(None);
    let session_id = state
        .sessions
        .register(identity.clone(), outbound_tx, shutdown_tx);
    tracing::info!(
        session_id = %session_id,
        identity = identity.as_deref().unwrap_or("anonymous"),
        "session connected"
    );

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_outbound(sink, outbound_rx));
    read_inbound(&state, session_id, stream, shutdown_rx).await;

    state.router.handle_disconnect(session_id).await;
    // The registry entry is gone, so the outbound channel is closed; the
    // writer drains what it can. Abort rather than wait on a stalled peer.
    writer.abort();
    tracing::info!(session_id = %session_id, "session disconnected");
}

async fn read_inbound<E: Environment, S: DocumentStore>(
    state: &AppState<E, S>,
    session_id: SessionId,
    mut stream: SplitStream<WebSocket>,
    mut shutdown: watch::Receiver<Option<DisconnectReason>>,
) {
    let mut limiter = RateLimiter::new(state.config.rate_limit, state.env.now());

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(reason) = *shutdown.borrow() {
                    tracing::warn!(session_id = %session_id, %reason, "force-disconnecting session");
                    break;
                }
            }
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else {
                    break;
                };
                match message {
                    Message::Text(text) => {
                        if !limiter.allow(state.env.now()) {
                            tracing::warn!(session_id = %session_id, "inbound rate limit exceeded");
                            state.sessions.kill(session_id, DisconnectReason::RateLimited);
                            break;
                        }
                        match ClientMessage::from_json(text.as_str()) {
                            Ok(message) => state.router.handle(session_id, message).await,
                            Err(error) => {
                                // A single malformed message is dropped, not
                                // fatal; sustained abuse hits the rate limiter.
                                tracing::warn!(
                                    session_id = %session_id,
                                    %error,
                                    "dropping malformed message"
                                );
                            }
                        }
                    }
                    Message::Close(_) => break,
                    Message::Binary(_) => {
                        tracing::warn!(session_id = %session_id, "dropping unexpected binary frame");
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
        }
    }
}

async fn write_outbound(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<String>) {
    while let Some(json) = rx.recv().await {
        if sink.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Body of the `GET /health` response.
#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    connections: usize,
    rooms: usize,
}

async fn health<E: Environment, S: DocumentStore>(
    State(state): State<AppState<E, S>>,
) -> Json<Health> {
    Json(Health {
        status: "ok",
        connections: state.sessions.count(),
        rooms: state.rooms.count(),
    })
}

async fn room_deleted<E: Environment, S: DocumentStore>(
    State(state): State<AppState<E, S>>,
    Path(room_id): Path<String>,
) -> StatusCode {
    let Ok(room_id) = room_id.parse::<RoomId>() else {
        return StatusCode::BAD_REQUEST;
    };
    if state.router.notify_deleted(&room_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
