//! A room view: snapshot, gesture input and sync channel wired together.

use crate::collaboration::{SyncChannel, SyncOutcome};
use crate::history::HistoryFetcher;
use crate::input::PointerEvent;
use crate::shapes::Shape;
use crate::snapshot::RoomSnapshot;
use crate::storage::SnapshotStore;
use crate::sync::{Connection, ServerMessage, SyncEvent};
use crate::tools::{GestureCapture, GestureOutput, ToolKind};
use kurbo::Point;
use std::sync::Arc;

/// One open room view.
///
/// Owns the room's snapshot exclusively. Every input (pointer event or
/// inbound message) runs to completion before the next one is taken, and
/// after [`RoomSession::close`] nothing touches the snapshot or storage.
pub struct RoomSession<S: SnapshotStore + ?Sized> {
    room_id: String,
    snapshot: RoomSnapshot,
    gesture: GestureCapture,
    channel: SyncChannel,
    store: Arc<S>,
    /// Cleared after the first failed save: the rest of the session is memory-only.
    persist: bool,
    preview: Option<Shape>,
    needs_redraw: bool,
    closed: bool,
}

impl<S: SnapshotStore + ?Sized> RoomSession<S> {
    /// Open a room view.
    ///
    /// Uses the stored snapshot when one exists; otherwise awaits the
    /// room's history (empty on any failure) and stores it. Queues the join
    /// announcement either way.
    pub async fn open<H: HistoryFetcher + ?Sized>(
        room_id: impl Into<String>,
        credential: &str,
        tool: ToolKind,
        store: Arc<S>,
        history: &H,
    ) -> Self {
        let room_id = room_id.into();

        let (snapshot, fetched) = match store.load_snapshot(&room_id) {
            Some(snapshot) => {
                log::info!("Restored {} shapes for room {}", snapshot.len(), room_id);
                (snapshot, false)
            }
            None => {
                let shapes = history.fetch(&room_id, credential).await;
                log::info!("Fetched {} shapes for room {}", shapes.len(), room_id);
                (RoomSnapshot::from_shapes(shapes), true)
            }
        };

        let mut session = Self::with_snapshot(room_id, snapshot, tool, store);
        if fetched && !session.snapshot.is_empty() {
            session.persist_snapshot();
        }
        session
    }

    /// Create a room view around an existing snapshot and queue the join.
    pub fn with_snapshot(
        room_id: impl Into<String>,
        snapshot: RoomSnapshot,
        tool: ToolKind,
        store: Arc<S>,
    ) -> Self {
        let room_id = room_id.into();
        let mut channel = SyncChannel::new(room_id.clone());
        channel.join();
        Self {
            room_id,
            snapshot,
            gesture: GestureCapture::new(tool),
            channel,
            store,
            persist: true,
            preview: None,
            needs_redraw: true,
            closed: false,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn snapshot(&self) -> &RoomSnapshot {
        &self.snapshot
    }

    /// All committed shapes, in draw order.
    pub fn shapes(&self) -> &[Shape] {
        self.snapshot.shapes()
    }

    /// The in-progress gesture preview, drawn above everything else.
    pub fn preview(&self) -> Option<&Shape> {
        self.preview.as_ref()
    }

    pub fn tool(&self) -> ToolKind {
        self.gesture.tool()
    }

    /// Change the active tool; any gesture in progress is dropped.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.gesture.set_tool(tool);
        if self.preview.take().is_some() {
            self.needs_redraw = true;
        }
    }

    /// Whether storage writes are still attempted.
    pub fn is_persisting(&self) -> bool {
        self.persist
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns true once after any change that requires a redraw.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    // --- Pointer input ---

    /// Process a pointer event.
    pub fn handle_pointer_event(&mut self, event: PointerEvent) {
        if self.closed {
            return;
        }
        let output = self.gesture.handle_pointer_event(event);
        self.apply_gesture(output);
    }

    /// Begin a gesture.
    pub fn press(&mut self, point: Point) {
        if self.closed {
            return;
        }
        self.gesture.press(point);
    }

    /// Continue a gesture.
    pub fn drag(&mut self, point: Point) {
        if self.closed {
            return;
        }
        let output = self.gesture.move_to(point);
        self.apply_gesture(output);
    }

    /// Finish a gesture.
    pub fn release(&mut self, point: Point) {
        if self.closed {
            return;
        }
        let output = self.gesture.release(point);
        self.apply_gesture(output);
    }

    fn apply_gesture(&mut self, output: GestureOutput) {
        match output {
            GestureOutput::None => {
                if !self.gesture.is_pressed() && self.preview.take().is_some() {
                    self.needs_redraw = true;
                }
            }
            GestureOutput::Preview(shape) => {
                self.preview = Some(shape);
                self.needs_redraw = true;
            }
            GestureOutput::Commit(shape) => {
                self.preview = None;
                self.commit(shape);
            }
        }
    }

    /// Append a locally drawn shape, persist it and queue its broadcast.
    fn commit(&mut self, shape: Shape) {
        self.snapshot.push(shape);
        self.persist_snapshot();
        self.channel.broadcast_shape(&shape);
        self.needs_redraw = true;
    }

    // --- Network input ---

    /// Apply one inbound message.
    pub fn handle_message(&mut self, msg: ServerMessage) -> Option<SyncOutcome> {
        if self.closed {
            return None;
        }
        let outcome = self.channel.handle_message(msg, &mut self.snapshot)?;
        if outcome.changed_snapshot() {
            self.persist_snapshot();
            self.needs_redraw = true;
        }
        Some(outcome)
    }

    /// Apply one connection event.
    pub fn handle_event(&mut self, event: SyncEvent) -> Option<SyncOutcome> {
        match event {
            SyncEvent::Received(msg) => self.handle_message(msg),
            SyncEvent::Connected => {
                log::info!("Connected, room {}", self.room_id);
                None
            }
            SyncEvent::Disconnected => {
                log::warn!("Disconnected from room {}", self.room_id);
                None
            }
            SyncEvent::Error { message } => {
                log::error!("Connection error in room {}: {}", self.room_id, message);
                None
            }
        }
    }

    /// Take pending outgoing messages.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        self.channel.take_outgoing()
    }

    /// Exchange pending traffic with the connection: flush queued outgoing
    /// messages, then handle every inbound event in arrival order.
    ///
    /// Returns the number of inbound events handled. Outgoing messages stay
    /// queued until the connection is open. A send that fails on an open
    /// connection is logged and dropped; delivery is best effort.
    pub fn pump<C: Connection + ?Sized>(&mut self, conn: &mut C) -> usize {
        if self.closed {
            return 0;
        }
        self.flush(conn);

        let events = conn.poll_events();
        let handled = events.len();
        for event in events {
            self.handle_event(event);
        }

        // Catch-up replies queued while handling
        self.flush(conn);
        handled
    }

    fn flush<C: Connection + ?Sized>(&mut self, conn: &mut C) {
        if !conn.is_connected() {
            return;
        }
        for msg in self.channel.take_outgoing() {
            if let Err(e) = conn.send(&msg) {
                log::warn!("Dropping outgoing message for room {}: {}", self.room_id, e);
            }
        }
    }

    /// Close the view: stop gesture input and inbound handling.
    ///
    /// The stored snapshot stays as it is.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.gesture.cancel();
        self.channel.detach();
        self.preview = None;
        log::info!("Closed room {}", self.room_id);
    }

    fn persist_snapshot(&mut self) {
        if !self.persist {
            return;
        }
        if let Err(e) = self.store.save(&self.room_id, &self.snapshot) {
            log::error!(
                "Failed to save room {}, continuing in memory only: {}",
                self.room_id,
                e
            );
            self.persist = false;
        }
    }
}
