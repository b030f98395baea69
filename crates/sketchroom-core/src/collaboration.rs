//! Bridge between one room connection and the local snapshot.
//!
//! Outbound shapes become protocol messages; inbound messages become
//! snapshot mutations. Messages are applied one at a time through `&mut`
//! access, so the snapshot needs no locking.

use crate::shapes::{Shape, ShapeEnvelope};
use crate::snapshot::RoomSnapshot;
use crate::sync::{ClientMessage, ServerMessage};

/// What an inbound message did to the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// A peer's shape was appended.
    Appended(Shape),
    /// The snapshot was replaced by a full transfer.
    Replaced { len: usize },
    /// A catch-up transfer was queued for a newly joined peer.
    CatchUpQueued { peer_id: String },
}

impl SyncOutcome {
    /// Whether the snapshot changed (and needs persisting and redrawing).
    pub fn changed_snapshot(&self) -> bool {
        matches!(self, SyncOutcome::Appended(_) | SyncOutcome::Replaced { .. })
    }
}

/// Sync channel adapter for one room.
pub struct SyncChannel {
    room_id: String,
    /// Whether inbound messages are still applied.
    attached: bool,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
}

impl SyncChannel {
    /// Create an attached channel for a room.
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            attached: true,
            outgoing: Vec::new(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Stop applying inbound messages and drop anything not yet sent.
    pub fn detach(&mut self) {
        self.attached = false;
        self.outgoing.clear();
    }

    /// Queue the join announcement.
    pub fn join(&mut self) {
        self.queue(ClientMessage::JoinRoom {
            room_id: self.room_id.clone(),
        });
    }

    /// Queue a broadcast of one locally committed shape.
    pub fn broadcast_shape(&mut self, shape: &Shape) {
        let message = match ShapeEnvelope::new(*shape).to_json() {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize shape: {}", e);
                return;
            }
        };
        self.queue(ClientMessage::Chat {
            room_id: self.room_id.clone(),
            message,
        });
    }

    /// Queue a full snapshot addressed to one peer.
    pub fn send_snapshot_to(&mut self, peer_id: &str, snapshot: &RoomSnapshot) {
        self.queue(ClientMessage::CanvasSync {
            to: peer_id.to_string(),
            shapes: snapshot.shapes().to_vec(),
        });
    }

    fn queue(&mut self, msg: ClientMessage) {
        if !self.attached {
            return;
        }
        match msg.to_json() {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to serialize client message: {}", e),
        }
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    /// Check if there are pending outgoing messages.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Apply one inbound message to the snapshot.
    ///
    /// Returns `None` when the message was ignored: detached channel,
    /// another room's chat, an unreadable payload, or a kind this client
    /// doesn't handle.
    pub fn handle_message(
        &mut self,
        msg: ServerMessage,
        snapshot: &mut RoomSnapshot,
    ) -> Option<SyncOutcome> {
        if !self.attached {
            return None;
        }

        match msg {
            ServerMessage::Chat { message, room_id } => {
                if let Some(room) = room_id.filter(|room| *room != self.room_id) {
                    log::debug!("Ignoring shape for room {} in room {}", room, self.room_id);
                    return None;
                }
                match ShapeEnvelope::from_json(&message) {
                    Ok(envelope) => {
                        snapshot.push(envelope.shape);
                        Some(SyncOutcome::Appended(envelope.shape))
                    }
                    Err(e) => {
                        log::warn!("Dropping unreadable shape broadcast: {}", e);
                        None
                    }
                }
            }
            ServerMessage::UserJoined { new_user_socket_id } => {
                log::info!(
                    "Peer {} joined room {}, sending {} shapes",
                    new_user_socket_id,
                    self.room_id,
                    snapshot.len()
                );
                self.send_snapshot_to(&new_user_socket_id, snapshot);
                Some(SyncOutcome::CatchUpQueued { peer_id: new_user_socket_id })
            }
            ServerMessage::CanvasUpdate { shapes } => {
                let len = shapes.len();
                snapshot.replace(shapes);
                log::info!("Room {} replaced with {} shapes", self.room_id, len);
                Some(SyncOutcome::Replaced { len })
            }
            ServerMessage::Error { message } => {
                log::warn!("Server error in room {}: {}", self.room_id, message);
                None
            }
            ServerMessage::Unknown => None,
        }
    }
}
