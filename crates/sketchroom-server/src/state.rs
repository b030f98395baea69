//! Room registry, wire messages and per-room history.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tokio::sync::{broadcast, mpsc};

/// Shapes kept per room for `GET /chats/{room}`.
pub const MAX_ROOM_HISTORY: usize = 10_000;
const CHANNEL_CAPACITY: usize = 256;

/// A message sent by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join a room
    #[serde(rename = "join_room", rename_all = "camelCase")]
    JoinRoom { room_id: String },
    /// One new shape, as a serialized `{"shape": …}` envelope
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat { room_id: String, message: String },
    /// Full snapshot for a single peer
    #[serde(rename = "canvas-sync")]
    CanvasSync {
        to: String,
        shapes: Vec<serde_json::Value>,
    },
}

/// A message delivered to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Shape broadcast from another peer
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat { room_id: String, message: String },
    /// Peer joined the room
    #[serde(rename = "user-joined", rename_all = "camelCase")]
    UserJoined { new_user_socket_id: String },
    /// Full snapshot from another peer
    #[serde(rename = "canvas-update")]
    CanvasUpdate { shapes: Vec<serde_json::Value> },
    /// Error message
    #[serde(rename = "error")]
    Error { message: String },
}

/// Body of `GET /chats/{room}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub message: String,
}

/// Room broadcast payload: sender id and message
pub type RoomEvent = (String, ServerMessage);

/// Room state
struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<RoomEvent>,
    /// Connected peer IDs
    peers: HashSet<String>,
    /// Recorded shape broadcasts, oldest first
    history: VecDeque<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
            history: VecDeque::new(),
        }
    }
}

/// Shared application state
pub struct AppState {
    /// Rooms by id. Kept after the last peer leaves so history survives.
    rooms: DashMap<String, Room>,
    /// Direct channel per connected peer
    peers: DashMap<String, mpsc::UnboundedSender<ServerMessage>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            peers: DashMap::new(),
        }
    }

    /// Register a connection and return its direct inbox.
    pub fn connect(&self, peer_id: &str) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.insert(peer_id.to_string(), tx);
        rx
    }

    /// Forget a connection.
    pub fn disconnect(&self, peer_id: &str) {
        self.peers.remove(peer_id);
    }

    /// Add peer to room and announce it to the others.
    pub fn join_room(&self, room_id: &str, peer_id: &str) -> broadcast::Receiver<RoomEvent> {
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(Room::new);
        room.peers.insert(peer_id.to_string());
        let rx = room.tx.subscribe();
        let _ = room.tx.send((
            peer_id.to_string(),
            ServerMessage::UserJoined {
                new_user_socket_id: peer_id.to_string(),
            },
        ));
        rx
    }

    /// Remove peer from room
    pub fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.peers.remove(peer_id);
        }
    }

    /// Record a shape broadcast and relay it to the room.
    pub fn chat(&self, room_id: &str, peer_id: &str, message: String) {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            return;
        };
        room.history.push_back(message.clone());
        while room.history.len() > MAX_ROOM_HISTORY {
            room.history.pop_front();
        }
        let _ = room.tx.send((
            peer_id.to_string(),
            ServerMessage::Chat {
                room_id: room_id.to_string(),
                message,
            },
        ));
    }

    /// Forward a snapshot to `to`, if it is in the sender's room.
    ///
    /// Returns whether the snapshot was delivered.
    pub fn forward_snapshot(&self, room_id: &str, to: &str, shapes: Vec<serde_json::Value>) -> bool {
        let in_room = self
            .rooms
            .get(room_id)
            .is_some_and(|room| room.peers.contains(to));
        if !in_room {
            return false;
        }
        match self.peers.get(to) {
            Some(tx) => tx.send(ServerMessage::CanvasUpdate { shapes }).is_ok(),
            None => false,
        }
    }

    /// Recorded history of a room (empty for unknown rooms).
    pub fn history(&self, room_id: &str) -> HistoryResponse {
        let messages = self
            .rooms
            .get(room_id)
            .map(|room| {
                room.history
                    .iter()
                    .map(|message| HistoryRecord { message: message.clone() })
                    .collect()
            })
            .unwrap_or_default();
        HistoryResponse { messages }
    }

    /// Number of peers currently in a room
    pub fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |room| room.peers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: &str = r#"{"shape":{"type":"rect","x":1,"y":2,"width":3,"height":4}}"#;

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"join_room","roomId":"r1"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::JoinRoom { room_id } if room_id == "r1"));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"canvas-sync","to":"p2","shapes":[{"type":"circle"}]}"#).unwrap();
        assert!(matches!(msg, ClientMessage::CanvasSync { to, shapes } if to == "p2" && shapes.len() == 1));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn test_server_message_wire_format() {
        let json = serde_json::to_string(&ServerMessage::UserJoined {
            new_user_socket_id: "p1".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"user-joined","newUserSocketId":"p1"}"#);
    }

    #[test]
    fn test_join_announces_peer() {
        let state = AppState::new();
        let mut rx_a = state.join_room("room", "a");
        let _rx_b = state.join_room("room", "b");

        // a sees its own announcement first, then b's
        let (from, _) = rx_a.try_recv().unwrap();
        assert_eq!(from, "a");
        let (from, msg) = rx_a.try_recv().unwrap();
        assert_eq!(from, "b");
        assert_eq!(
            msg,
            ServerMessage::UserJoined {
                new_user_socket_id: "b".to_string()
            }
        );
        assert_eq!(state.peer_count("room"), 2);
    }

    #[test]
    fn test_chat_is_recorded_and_relayed() {
        let state = AppState::new();
        let mut rx = state.join_room("room", "a");
        let _ = rx.try_recv();

        state.chat("room", "b", SHAPE.to_string());

        let (from, msg) = rx.try_recv().unwrap();
        assert_eq!(from, "b");
        assert!(matches!(msg, ServerMessage::Chat { message, .. } if message == SHAPE));
        assert_eq!(state.history("room").messages, vec![HistoryRecord { message: SHAPE.to_string() }]);
    }

    #[test]
    fn test_chat_to_unknown_room_is_dropped() {
        let state = AppState::new();
        state.chat("nowhere", "a", SHAPE.to_string());
        assert!(state.history("nowhere").messages.is_empty());
    }

    #[test]
    fn test_history_is_capped() {
        let state = AppState::new();
        let _rx = state.join_room("room", "a");
        for i in 0..MAX_ROOM_HISTORY + 5 {
            state.chat("room", "a", i.to_string());
        }
        let history = state.history("room").messages;
        assert_eq!(history.len(), MAX_ROOM_HISTORY);
        assert_eq!(history[0].message, "5");
    }

    #[test]
    fn test_history_outlives_peers() {
        let state = AppState::new();
        let _rx = state.join_room("room", "a");
        state.chat("room", "a", SHAPE.to_string());
        state.leave_room("room", "a");

        assert_eq!(state.peer_count("room"), 0);
        assert_eq!(state.history("room").messages.len(), 1);
    }

    #[test]
    fn test_snapshot_goes_only_to_target_in_room() {
        let state = AppState::new();
        let mut inbox_b = state.connect("b");
        let mut inbox_c = state.connect("c");
        let _rx_b = state.join_room("room", "b");
        let _rx_c = state.join_room("other", "c");

        let shapes = vec![serde_json::json!({"type":"rect","x":0,"y":0,"width":1,"height":1})];
        assert!(state.forward_snapshot("room", "b", shapes.clone()));
        assert!(!state.forward_snapshot("room", "c", shapes.clone()));
        assert!(!state.forward_snapshot("room", "ghost", shapes.clone()));

        assert_eq!(inbox_b.try_recv().unwrap(), ServerMessage::CanvasUpdate { shapes });
        assert!(inbox_c.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_peer_gets_nothing() {
        let state = AppState::new();
        let _inbox = state.connect("b");
        let _rx = state.join_room("room", "b");
        state.disconnect("b");
        assert!(!state.forward_snapshot("room", "b", Vec::new()));
    }
}
