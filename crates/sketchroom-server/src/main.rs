//! SketchRoom Relay Server
//!
//! Relays shape broadcasts between clients in the same room, forwards
//! catch-up snapshots to newly joined peers and serves each room's
//! recorded history.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join_room", "roomId": "room-id" }
//! { "type": "chat", "roomId": "room-id", "message": "{\"shape\":{...}}" }
//! { "type": "canvas-sync", "to": "<peer-id>", "shapes": [...] }
//! ```
//! The server answers with `user-joined`, `chat`, `canvas-update` and
//! `error` messages.

mod state;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use state::{AppState, ClientMessage, HistoryResponse, RoomEvent, ServerMessage};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_ADDR: &str = "0.0.0.0:3030";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchroom_server=info,tower_http=info".into()),
        )
        .init();

    let addr: SocketAddr = std::env::var("SKETCHROOM_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    let app = router(Arc::new(AppState::new()));

    info!("SketchRoom relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/chats/{room_id}", get(chat_history))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "SketchRoom Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// Recorded shape history of a room
async fn chat_history(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Json<HistoryResponse> {
    Json(state.history(&room_id))
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    /// Session credential; accepted but not checked.
    #[allow(dead_code)]
    token: Option<String>,
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(_params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and send one message. Returns false once the socket is gone.
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut inbox = state.connect(&peer_id);
    let mut current_room: Option<String> = None;
    let mut room_rx: Option<broadcast::Receiver<RoomEvent>> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => client_msg,
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer_id, e);
                                let err = ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                };
                                if !send_message(&mut sender, &err).await {
                                    break;
                                }
                                continue;
                            }
                        };

                        match client_msg {
                            ClientMessage::JoinRoom { room_id } => {
                                if let Some(old_room) = current_room.take() {
                                    state.leave_room(&old_room, &peer_id);
                                }
                                room_rx = Some(state.join_room(&room_id, &peer_id));
                                info!("Peer {} joined room {} ({} peers)", peer_id, room_id, state.peer_count(&room_id));
                                current_room = Some(room_id);
                            }
                            ClientMessage::Chat { room_id, message } => {
                                if current_room.as_deref() == Some(room_id.as_str()) {
                                    state.chat(&room_id, &peer_id, message);
                                } else {
                                    debug!("Peer {} sent chat for room {} without joining", peer_id, room_id);
                                }
                            }
                            ClientMessage::CanvasSync { to, shapes } => {
                                if let Some(ref room) = current_room {
                                    let count = shapes.len();
                                    if state.forward_snapshot(room, &to, shapes) {
                                        debug!("Forwarded {} shapes from {} to {}", count, peer_id, to);
                                    } else {
                                        debug!("Dropped snapshot from {} for absent peer {}", peer_id, to);
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary and ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Handle broadcast messages from room
            msg = async {
                match &mut room_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => {
                        // No room joined, just wait forever
                        std::future::pending::<Option<RoomEvent>>().await
                    }
                }
            } => {
                if let Some((from, server_msg)) = msg {
                    // Don't echo back to sender
                    if from != peer_id && !send_message(&mut sender, &server_msg).await {
                        break;
                    }
                }
            }

            // Messages addressed to this peer only
            Some(direct) = inbox.recv() => {
                if !send_message(&mut sender, &direct).await {
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(ref room) = current_room {
        state.leave_room(room, &peer_id);
    }
    state.disconnect(&peer_id);
    info!("Connection closed: {}", peer_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_history_endpoint() {
        let state = Arc::new(AppState::new());
        let _rx = state.join_room("room-1", "peer");
        state.chat("room-1", "peer", r#"{"shape":{"type":"circle","centerX":1,"centerY":1,"radius":1}}"#.to_string());

        let Json(body) = chat_history(State(state.clone()), Path("room-1".to_string())).await;
        assert_eq!(body.messages.len(), 1);

        let json = serde_json::to_value(&body).unwrap();
        assert!(json["messages"][0]["message"].as_str().unwrap().contains("circle"));

        let Json(empty) = chat_history(State(state), Path("unknown".to_string())).await;
        assert!(empty.messages.is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health().await, "ok");
    }
}
