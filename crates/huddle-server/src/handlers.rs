//! Connection handlers for the Huddle server.
//!
//! This module owns the WebSocket lifecycle (accept, event pump, disconnect)
//! and the read-only HTTP views over presence and message history.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use huddle_core::{
    MemoryStore, MessageRouter, MessageStore, RoomDirectory, RouterConfig, SessionRegistry,
    TypingTracker,
};
use huddle_protocol::{codec, ClientEvent, ConnectionId, MessageRecord, PresenceEntry};
use huddle_transport::PeerMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The message router.
    pub router: MessageRouter,
    /// Presence registry, shared with the router.
    pub registry: Arc<SessionRegistry>,
    /// Room directory, shared with the router.
    pub rooms: Arc<RoomDirectory>,
    /// Durable message storage.
    pub store: Arc<dyn MessageStore>,
    /// Connected peers and their outbound queues.
    pub peers: Arc<PeerMap>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state with fresh hub components.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let rooms = Arc::new(RoomDirectory::new());
        let typing = Arc::new(TypingTracker::new());
        let store: Arc<dyn MessageStore> = Arc::new(MemoryStore::new());
        let peers = Arc::new(PeerMap::new());

        let router = MessageRouter::with_config(
            registry.clone(),
            rooms.clone(),
            typing,
            store.clone(),
            peers.clone(),
            RouterConfig {
                default_room: config.chat.default_room.clone(),
            },
        );

        Self {
            router,
            registry,
            rooms,
            store,
            peers,
            config,
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .route("/users", get(users_handler))
        .route("/messages", get(public_messages_handler))
        .route("/messages/:room", get(room_messages_handler))
        .route(
            "/messages/private/:user_a/:user_b",
            get(private_messages_handler),
        )
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Huddle server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Read model: all online users.
async fn users_handler(State(state): State<Arc<AppState>>) -> Json<Vec<PresenceEntry>> {
    Json(state.registry.online_users())
}

/// Read model: all public messages, timestamp ascending.
async fn public_messages_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MessageRecord>>, StatusCode> {
    state
        .store
        .public_history()
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "History query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Read model: one room's messages, timestamp ascending.
async fn room_messages_handler(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
) -> Result<Json<Vec<MessageRecord>>, StatusCode> {
    state
        .store
        .room_history(&room)
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, room = %room, "History query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Read model: private messages between two users.
async fn private_messages_handler(
    State(state): State<Arc<AppState>>,
    Path((user_a, user_b)): Path<(String, String)>,
) -> Result<Json<Vec<MessageRecord>>, StatusCode> {
    state
        .store
        .private_history(&user_a, &user_b)
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "Private history query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    if state.peers.connection_count() >= state.config.limits.max_connections {
        warn!("Connection limit reached, refusing socket");
        metrics::record_error("connection_limit");
        return;
    }

    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();
    debug!(connection = %connection_id, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Register with the transport adapter before any event can target us.
    let mut outbound_rx = state.peers.register(connection_id.clone());
    state.router.handle_connect(&connection_id);

    // Read buffer for partial frames
    let mut read_buffer = BytesMut::with_capacity(4096);

    // Event pump
    loop {
        tokio::select! {
            biased;

            // Drain outbound events resolved by the router for this connection
            Some(event) = outbound_rx.recv() => {
                match codec::encode(&event) {
                    Ok(data) => {
                        metrics::record_message(data.len(), "outbound");
                        if sender.send(Message::Binary(data.to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(connection = %connection_id, error = %e, "Failed to encode event");
                        metrics::record_error("encode");
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        if data.len() > state.config.limits.max_message_size {
                            warn!(connection = %connection_id, size = data.len(), "Oversized frame dropped");
                            metrics::record_error("oversized_frame");
                            continue;
                        }

                        let start = Instant::now();
                        metrics::record_message(data.len(), "inbound");
                        read_buffer.extend_from_slice(&data);
                        pump_inbound(&state, &connection_id, &mut read_buffer).await;
                        metrics::record_latency(start.elapsed().as_secs_f64());
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Treat text as binary
                        read_buffer.extend_from_slice(text.as_bytes());
                        pump_inbound(&state, &connection_id, &mut read_buffer).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: stop delivery first, then let the router announce the departure.
    state.peers.unregister(&connection_id);
    state.router.handle_disconnect(&connection_id).await;
    metrics::set_active_rooms(state.rooms.room_count());

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Decode and route every complete event currently buffered.
async fn pump_inbound(state: &Arc<AppState>, connection_id: &ConnectionId, buf: &mut BytesMut) {
    loop {
        match codec::decode_from::<ClientEvent>(buf) {
            Ok(Some(event)) => {
                debug!(connection = %connection_id, event = event.name(), "Inbound event");

                match state.router.handle_event(connection_id, event).await {
                    // Routed events can create rooms, so refresh the gauge here
                    // rather than waiting for a disconnect.
                    Ok(()) => metrics::set_active_rooms(state.rooms.room_count()),
                    Err(e) => {
                        // Malformed payloads are dropped; the connection stays up.
                        warn!(connection = %connection_id, error = %e, "Dropped event");
                        metrics::record_error("malformed_event");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(connection = %connection_id, error = %e, "Protocol error, clearing buffer");
                metrics::record_error("protocol");
                buf.clear();
                break;
            }
        }
    }
}
