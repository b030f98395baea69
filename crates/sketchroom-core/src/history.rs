//! Cold-start retrieval of a room's recorded shapes.
//!
//! Only consulted when no local snapshot exists. Every failure degrades to
//! an empty history: an empty room is an acceptable start, a crash is not.

use crate::shapes::{Shape, ShapeEnvelope};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Reasons a history request produced nothing. Logged, never surfaced.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Unexpected status: {0}")]
    Status(u16),
    #[error("Malformed response body: {0}")]
    Body(String),
}

/// Source of a room's authoritative shape history.
pub trait HistoryFetcher {
    /// Fetch the ordered shapes recorded for a room. Never fails: any error
    /// yields an empty list.
    fn fetch<'a>(&'a self, room_id: &'a str, credential: &'a str) -> BoxFuture<'a, Vec<Shape>>;
}

/// A fetcher for offline use: every room starts empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistoryFetcher for NoHistory {
    fn fetch<'a>(&'a self, _room_id: &'a str, _credential: &'a str) -> BoxFuture<'a, Vec<Shape>> {
        Box::pin(async { Vec::new() })
    }
}

/// One stored record: the serialized `{"shape": …}` envelope.
#[derive(Debug, Deserialize)]
struct HistoryRecord {
    message: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    messages: Vec<HistoryRecord>,
}

/// Parse a history response body.
///
/// Records that don't carry a valid shape are dropped individually; a body
/// that isn't a history response at all is an error.
pub fn parse_history(body: &str) -> Result<Vec<Shape>, HistoryError> {
    let response: HistoryResponse =
        serde_json::from_str(body).map_err(|e| HistoryError::Body(e.to_string()))?;

    let mut shapes = Vec::with_capacity(response.messages.len());
    for (index, record) in response.messages.iter().enumerate() {
        match ShapeEnvelope::from_json(&record.message) {
            Ok(envelope) => shapes.push(envelope.shape),
            Err(e) => log::debug!("Skipping history record {}: {}", index, e),
        }
    }
    Ok(shapes)
}

#[cfg(feature = "network")]
mod http {
    use super::*;
    use url::Url;

    /// Fetches history from `GET {base}/chats/{room}` with the credential in
    /// the `Authorization` header.
    #[derive(Debug, Clone)]
    pub struct HttpHistoryFetcher {
        client: reqwest::Client,
        base_url: Url,
    }

    impl HttpHistoryFetcher {
        /// Create a fetcher for the given HTTP backend.
        pub fn new(base_url: Url) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url,
            }
        }

        /// Build the history URL for a room.
        pub fn history_url(&self, room_id: &str) -> Result<Url, HistoryError> {
            let mut url = self.base_url.clone();
            url.path_segments_mut()
                .map_err(|_| HistoryError::Request(format!("Cannot-be-a-base URL: {}", self.base_url)))?
                .pop_if_empty()
                .push("chats")
                .push(room_id);
            Ok(url)
        }

        async fn try_fetch(&self, room_id: &str, credential: &str) -> Result<Vec<Shape>, HistoryError> {
            let url = self.history_url(room_id)?;
            let response = self
                .client
                .get(url)
                .header(reqwest::header::AUTHORIZATION, credential)
                .send()
                .await
                .map_err(|e| HistoryError::Request(e.to_string()))?;

            if !response.status().is_success() {
                return Err(HistoryError::Status(response.status().as_u16()));
            }

            let body = response
                .text()
                .await
                .map_err(|e| HistoryError::Body(e.to_string()))?;
            parse_history(&body)
        }
    }

    impl HistoryFetcher for HttpHistoryFetcher {
        fn fetch<'a>(&'a self, room_id: &'a str, credential: &'a str) -> BoxFuture<'a, Vec<Shape>> {
            Box::pin(async move {
                if credential.is_empty() {
                    log::warn!("No credential available, skipping history fetch for room {}", room_id);
                    return Vec::new();
                }
                match self.try_fetch(room_id, credential).await {
                    Ok(shapes) => {
                        log::info!("Fetched {} shapes of history for room {}", shapes.len(), room_id);
                        shapes
                    }
                    Err(e) => {
                        log::error!("Error fetching history for room {}: {}", room_id, e);
                        Vec::new()
                    }
                }
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;
        use tokio::sync::oneshot;

        const BODY: &str = r#"{"messages":[{"message":"{\"shape\":{\"type\":\"circle\",\"centerX\":5,\"centerY\":5,\"radius\":2}}"}]}"#;

        /// Answer a single HTTP request with a canned response; the raw request is
        /// reported through the returned receiver.
        async fn serve_once(status: &'static str, body: &'static str) -> (Url, oneshot::Receiver<String>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let (tx, rx) = oneshot::channel();
            tokio::spawn(async move {
                if let Ok((mut socket, _)) = listener.accept().await {
                    let mut buf = vec![0u8; 8192];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
                    let response = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });
            (Url::parse(&format!("http://{addr}")).unwrap(), rx)
        }

        #[test]
        fn test_history_url() {
            let fetcher = HttpHistoryFetcher::new(Url::parse("http://localhost:3030").unwrap());
            assert_eq!(
                fetcher.history_url("room 1").unwrap().as_str(),
                "http://localhost:3030/chats/room%201"
            );

            let fetcher = HttpHistoryFetcher::new(Url::parse("http://example.com/api/").unwrap());
            assert_eq!(
                fetcher.history_url("abc").unwrap().as_str(),
                "http://example.com/api/chats/abc"
            );
        }

        #[tokio::test]
        async fn test_fetch_success_sends_credential() {
            let (base, request) = serve_once("200 OK", BODY).await;
            let fetcher = HttpHistoryFetcher::new(base);

            let shapes = fetcher.fetch("room-1", "secret").await;
            assert_eq!(shapes.len(), 1);
            assert_eq!(shapes[0].type_name(), "circle");

            let request = request.await.unwrap().to_ascii_lowercase();
            assert!(request.starts_with("get /chats/room-1 "));
            assert!(request.contains("authorization: secret"));
        }

        #[tokio::test]
        async fn test_fetch_error_status_is_empty() {
            let (base, _request) = serve_once("500 Internal Server Error", "{}").await;
            let fetcher = HttpHistoryFetcher::new(base.clone());
            assert!(fetcher.fetch("room-1", "secret").await.is_empty());

            let (base, _request) = serve_once("403 Forbidden", "").await;
            let fetcher = HttpHistoryFetcher::new(base);
            assert!(matches!(
                fetcher.try_fetch("room-1", "secret").await,
                Err(HistoryError::Status(403))
            ));
        }

        #[tokio::test]
        async fn test_fetch_malformed_body_is_empty() {
            let (base, _request) = serve_once("200 OK", "<html>oops</html>").await;
            let fetcher = HttpHistoryFetcher::new(base);
            assert!(fetcher.fetch("room-1", "secret").await.is_empty());
        }

        #[tokio::test]
        async fn test_fetch_unreachable_is_empty() {
            let fetcher = HttpHistoryFetcher::new(Url::parse("http://127.0.0.1:9").unwrap());
            assert!(fetcher.fetch("room-1", "secret").await.is_empty());
            assert!(matches!(
                fetcher.try_fetch("room-1", "secret").await,
                Err(HistoryError::Request(_))
            ));
        }

        #[tokio::test]
        async fn test_fetch_without_credential_makes_no_request() {
            let (base, request) = serve_once("200 OK", BODY).await;
            let fetcher = HttpHistoryFetcher::new(base);

            assert!(fetcher.fetch("room-1", "").await.is_empty());
            drop(fetcher);
            let waited = tokio::time::timeout(std::time::Duration::from_millis(100), request).await;
            assert!(waited.is_err());
        }
    }
}

#[cfg(feature = "network")]
pub use http::HttpHistoryFetcher;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Rectangle;

    #[test]
    fn test_parse_history() {
        let body = r#"{"messages":[
            {"message":"{\"shape\":{\"type\":\"rect\",\"x\":1,\"y\":2,\"width\":3,\"height\":4}}"},
            {"message":"{\"shape\":{\"type\":\"pencil\",\"startX\":0,\"startY\":0,\"endX\":1,\"endY\":1}}"}
        ]}"#;
        let shapes = parse_history(body).unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0], Shape::Rectangle(Rectangle::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(shapes[1].type_name(), "pencil");
    }

    #[test]
    fn test_parse_history_drops_bad_records() {
        let body = r#"{"messages":[
            {"message":"hello there"},
            {"message":"{\"shape\":{\"type\":\"rect\",\"x\":1,\"y\":2,\"width\":3,\"height\":4}}"},
            {"message":"{\"shape\":{\"type\":\"star\"}}"}
        ]}"#;
        let shapes = parse_history(body).unwrap();
        assert_eq!(shapes, vec![Shape::Rectangle(Rectangle::new(1.0, 2.0, 3.0, 4.0))]);
    }

    #[test]
    fn test_parse_history_rejects_bad_body() {
        assert!(matches!(parse_history("<html>"), Err(HistoryError::Body(_))));
        assert!(matches!(parse_history(r#"{"rooms":[]}"#), Err(HistoryError::Body(_))));
    }

    #[test]
    fn test_no_history_is_empty() {
        let shapes = crate::block_on(NoHistory.fetch("room", "token"));
        assert!(shapes.is_empty());
    }
}
