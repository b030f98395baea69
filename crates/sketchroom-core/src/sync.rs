//! Wire protocol and connection plumbing.
//!
//! Provides the JSON messages exchanged with the relay server and a
//! platform-agnostic WebSocket client interface.

use crate::shapes::Shape;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Announce presence in a room
    #[serde(rename = "join_room", rename_all = "camelCase")]
    JoinRoom { room_id: String },
    /// Broadcast one new shape; `message` is a serialized `ShapeEnvelope`
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat { room_id: String, message: String },
    /// Full snapshot addressed to one peer (catch-up)
    #[serde(rename = "canvas-sync")]
    CanvasSync { to: String, shapes: Vec<Shape> },
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A shape broadcast by a peer
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },
    /// A peer joined the room and needs catching up
    #[serde(rename = "user-joined", rename_all = "camelCase")]
    UserJoined { new_user_socket_id: String },
    /// Full snapshot replacing the recipient's view
    #[serde(rename = "canvas-update")]
    CanvasUpdate { shapes: Vec<Shape> },
    /// Error message
    #[serde(rename = "error")]
    Error { message: String },
    /// Any message kind this client doesn't understand
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Connection errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Not connected")]
    NotConnected,
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Send failed: {0}")]
    Send(String),
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from a connection
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected to server
    Connected,
    /// Disconnected from server
    Disconnected,
    /// A message arrived
    Received(ServerMessage),
    /// Error occurred
    Error { message: String },
}

/// A room-scoped, already established bidirectional channel.
///
/// Owned by the application shell; the engine only sends on it and drains
/// its inbound queue.
pub trait Connection {
    /// Send a text message.
    fn send(&mut self, msg: &str) -> Result<(), SyncError>;

    /// Take pending events, oldest first (non-blocking).
    fn poll_events(&mut self) -> Vec<SyncEvent>;

    /// Get current connection state.
    fn state(&self) -> ConnectionState;

    /// Check if connected.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Parse an inbound text frame; unparseable frames are logged and dropped.
pub(crate) fn parse_frame(txt: &str) -> Option<SyncEvent> {
    match ServerMessage::from_json(txt) {
        Ok(msg) => Some(SyncEvent::Received(msg)),
        Err(e) => {
            log::warn!("Failed to parse server message ({}): {}", e, truncate(txt, 100));
            None
        }
    }
}

/// At most `max` characters of `s`, for log lines.
fn truncate(s: &str, max: usize) -> &str {
    s.char_indices().nth(max).map_or(s, |(i, _)| &s[..i])
}

// ============================================================================
// In-process connection
// ============================================================================

/// Connection backed by in-memory queues.
///
/// Inbound events are injected with [`MemoryConnection::push`]; outbound
/// frames are collected for [`MemoryConnection::take_sent`]. Used by tests
/// and by hosts that ferry frames themselves.
#[derive(Debug)]
pub struct MemoryConnection {
    state: ConnectionState,
    inbound: VecDeque<SyncEvent>,
    sent: Vec<String>,
}

impl MemoryConnection {
    /// Create a connected in-memory channel.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connected,
            inbound: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Queue an inbound event.
    pub fn push(&mut self, event: SyncEvent) {
        self.inbound.push_back(event);
    }

    /// Queue an inbound server message.
    pub fn push_message(&mut self, msg: ServerMessage) {
        self.push(SyncEvent::Received(msg));
    }

    /// Queue a raw inbound text frame, parsed the way a socket would.
    pub fn push_frame(&mut self, txt: &str) {
        if let Some(event) = parse_frame(txt) {
            self.push(event);
        }
    }

    /// Take everything sent so far.
    pub fn take_sent(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sent)
    }

    /// Force the connection state (e.g. to simulate a drop).
    pub fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MemoryConnection {
    fn send(&mut self, msg: &str) -> Result<(), SyncError> {
        if self.state != ConnectionState::Connected {
            return Err(SyncError::NotConnected);
        }
        self.sent.push(msg.to_string());
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SyncEvent> {
        self.inbound.drain(..).collect()
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

// ============================================================================
// WASM WebSocket Client
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod wasm_client {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    /// WebSocket client for WASM.
    ///
    /// Browser callbacks only enqueue events; they are handled when polled
    /// via `poll_events()`.
    pub struct WasmWebSocket {
        ws: Option<WebSocket>,
        state: ConnectionState,
        events: Rc<RefCell<Vec<SyncEvent>>>,
        // Store closures to prevent them from being dropped
        _on_open: Option<Closure<dyn Fn()>>,
        _on_message: Option<Closure<dyn Fn(MessageEvent)>>,
        _on_close: Option<Closure<dyn Fn(CloseEvent)>>,
        _on_error: Option<Closure<dyn Fn(ErrorEvent)>>,
    }

    impl WasmWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                ws: None,
                state: ConnectionState::Disconnected,
                events: Rc::new(RefCell::new(Vec::new())),
                _on_open: None,
                _on_message: None,
                _on_close: None,
                _on_error: None,
            }
        }

        /// Connect to a WebSocket server.
        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.ws.is_some() {
                return Err(SyncError::AlreadyConnected);
            }

            let ws = WebSocket::new(url).map_err(|e| SyncError::InvalidUrl(format!("{:?}", e)))?;
            ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

            self.state = ConnectionState::Connecting;
            let events = self.events.clone();

            let events_open = events.clone();
            let on_open = Closure::wrap(Box::new(move || {
                events_open.borrow_mut().push(SyncEvent::Connected);
            }) as Box<dyn Fn()>);
            ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

            let events_msg = events.clone();
            let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
                if let Ok(txt) = e.data().dyn_into::<js_sys::JsString>() {
                    let s: String = txt.into();
                    if let Some(event) = parse_frame(&s) {
                        events_msg.borrow_mut().push(event);
                    }
                }
            }) as Box<dyn Fn(MessageEvent)>);
            ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

            let events_close = events.clone();
            let on_close = Closure::wrap(Box::new(move |_e: CloseEvent| {
                events_close.borrow_mut().push(SyncEvent::Disconnected);
            }) as Box<dyn Fn(CloseEvent)>);
            ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

            let events_err = events;
            let on_error = Closure::wrap(Box::new(move |_e: ErrorEvent| {
                events_err.borrow_mut().push(SyncEvent::Error {
                    message: "WebSocket error".to_string(),
                });
            }) as Box<dyn Fn(ErrorEvent)>);
            ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

            self.ws = Some(ws);
            self._on_open = Some(on_open);
            self._on_message = Some(on_message);
            self._on_close = Some(on_close);
            self._on_error = Some(on_error);

            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(ws) = self.ws.take() {
                ws.set_onmessage(None);
                let _ = ws.close();
            }
            self.state = ConnectionState::Disconnected;
            self._on_open = None;
            self._on_message = None;
            self._on_close = None;
            self._on_error = None;
        }
    }

    impl Connection for WasmWebSocket {
        fn send(&mut self, msg: &str) -> Result<(), SyncError> {
            match self.ws {
                Some(ref ws) => ws
                    .send_with_str(msg)
                    .map_err(|e| SyncError::Send(format!("{:?}", e))),
                None => Err(SyncError::NotConnected),
            }
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let events = std::mem::take(&mut *self.events.borrow_mut());
            for event in &events {
                match event {
                    SyncEvent::Connected => self.state = ConnectionState::Connected,
                    SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                    SyncEvent::Received(_) => {}
                }
            }
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for WasmWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_client::WasmWebSocket;

// ============================================================================
// Native WebSocket Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    /// Check that `url` is a WebSocket URL this client can open.
    ///
    /// The native client is built without TLS, so `wss` is refused here
    /// rather than failing later on the socket thread.
    pub(crate) fn validate_url(url: &str) -> Result<Url, SyncError> {
        let parsed = Url::parse(url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "ws" => Ok(parsed),
            "wss" => Err(SyncError::InvalidUrl(
                "wss:// is not supported by the native client (built without TLS)".to_string(),
            )),
            other => Err(SyncError::InvalidUrl(format!(
                "Invalid WebSocket URL scheme: {}",
                other
            ))),
        }
    }

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client for native platforms.
    ///
    /// The socket lives on a background thread; frames cross over channels,
    /// so the engine thread never blocks on the network.
    pub struct NativeWebSocket {
        state: ConnectionState,
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<SyncEvent>>,
        /// Handle to the WebSocket thread.
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a WebSocket server.
        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::AlreadyConnected);
            }

            let parsed_url = validate_url(url)?;

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();

            // Never log the URL itself: it carries the credential.
            let host = parsed_url.host_str().unwrap_or_default().to_string();
            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("WebSocket thread: connecting to {}", host);

                match connect(&url) {
                    Ok((mut socket, response)) => {
                        log::info!("WebSocket connected, status: {}", response.status());
                        let _ = event_tx.send(SyncEvent::Connected);

                        // Short read timeout so the loop can service outgoing commands
                        if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
                            let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                        }

                        loop {
                            match cmd_rx.try_recv() {
                                Ok(WsCommand::Send(msg)) => {
                                    log::debug!("WebSocket sending {} bytes", msg.len());
                                    if let Err(e) = socket.send(Message::Text(msg)) {
                                        log::error!("WebSocket send error: {}", e);
                                        break;
                                    }
                                }
                                Ok(WsCommand::Close) => {
                                    log::info!("WebSocket close requested");
                                    let _ = socket.close(None);
                                    break;
                                }
                                Err(TryRecvError::Disconnected) => {
                                    log::info!("WebSocket command channel disconnected");
                                    break;
                                }
                                Err(TryRecvError::Empty) => {}
                            }

                            match socket.read() {
                                Ok(Message::Text(txt)) => {
                                    if let Some(event) = parse_frame(&txt) {
                                        let _ = event_tx.send(event);
                                    }
                                }
                                Ok(Message::Ping(data)) => {
                                    let _ = socket.send(Message::Pong(data));
                                }
                                Ok(Message::Close(_)) => {
                                    log::info!("WebSocket received close frame");
                                    break;
                                }
                                Ok(_) => {} // Ignore binary, pong
                                Err(tungstenite::Error::Io(ref e))
                                    if e.kind() == std::io::ErrorKind::WouldBlock
                                        || e.kind() == std::io::ErrorKind::TimedOut =>
                                {
                                    continue;
                                }
                                Err(e) => {
                                    log::error!("WebSocket read error: {}", e);
                                    break;
                                }
                            }
                        }

                        log::info!("WebSocket thread exiting");
                        let _ = event_tx.send(SyncEvent::Disconnected);
                    }
                    Err(e) => {
                        log::error!("WebSocket connection failed: {}", e);
                        let _ = event_tx.send(SyncEvent::Error {
                            message: format!("Connection failed: {}", e),
                        });
                    }
                }
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }
    }

    impl Connection for NativeWebSocket {
        fn send(&mut self, msg: &str) -> Result<(), SyncError> {
            match self.cmd_tx {
                Some(ref tx) => tx
                    .send(WsCommand::Send(msg.to_string()))
                    .map_err(|e| SyncError::Send(e.to_string())),
                None => Err(SyncError::NotConnected),
            }
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let mut events = Vec::new();
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                        SyncEvent::Received(_) => {}
                    }
                    events.push(event);
                }
            }
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeWebSocket;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Rectangle;

    #[test]
    fn test_client_message_serialize() {
        let msg = ClientMessage::JoinRoom { room_id: "test-room".to_string() };
        let json = msg.to_json().unwrap();
        assert_eq!(json, r#"{"type":"join_room","roomId":"test-room"}"#);

        let msg = ClientMessage::CanvasSync {
            to: "peer-2".to_string(),
            shapes: vec![Rectangle::new(0.0, 0.0, 1.0, 1.0).into()],
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "canvas-sync");
        assert_eq!(value["to"], "peer-2");
        assert_eq!(value["shapes"][0]["type"], "rect");
    }

    #[test]
    fn test_server_message_deserialize() {
        let msg = ServerMessage::from_json(r#"{"type":"user-joined","newUserSocketId":"abc"}"#).unwrap();
        assert_eq!(msg, ServerMessage::UserJoined { new_user_socket_id: "abc".to_string() });

        let msg = ServerMessage::from_json(r#"{"type":"chat","message":"{}"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Chat { message: "{}".to_string(), room_id: None });

        let msg = ServerMessage::from_json(r#"{"type":"canvas-update","shapes":[]}"#).unwrap();
        assert_eq!(msg, ServerMessage::CanvasUpdate { shapes: vec![] });
    }

    #[test]
    fn test_unknown_kind_parses_as_unknown() {
        let msg = ServerMessage::from_json(r#"{"type":"cursor","x":1,"y":2}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let mut conn = MemoryConnection::new();
        conn.push_frame("not json");
        conn.push_frame(r#"{"type":"canvas-update","shapes":[{"type":"blob"}]}"#);
        conn.push_frame(r#"{"type":"user-joined","newUserSocketId":"p"}"#);
        assert_eq!(conn.poll_events().len(), 1);
    }

    #[test]
    fn test_memory_connection_send_requires_connected() {
        let mut conn = MemoryConnection::new();
        conn.send("a").unwrap();
        conn.set_state(ConnectionState::Disconnected);
        assert_eq!(conn.send("b"), Err(SyncError::NotConnected));
        assert_eq!(conn.take_sent(), vec!["a".to_string()]);
    }
}
