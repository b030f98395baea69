//! Client configuration: backend endpoints, storage location and credential.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

const ENV_HTTP_BACKEND: &str = "SKETCHROOM_HTTP_BACKEND";
const ENV_WS_URL: &str = "SKETCHROOM_WS_URL";
const ENV_STORAGE_DIR: &str = "SKETCHROOM_STORAGE_DIR";
const ENV_TOKEN: &str = "SKETCHROOM_TOKEN";

/// Errors from loading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid {field} URL: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
}

/// Where a client finds its backend and keeps its snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the HTTP backend serving room history.
    pub http_backend: String,
    /// WebSocket URL of the relay, without the token.
    pub ws_url: String,
    /// Snapshot directory; the platform data directory when unset.
    pub storage_dir: Option<PathBuf>,
    /// Opaque session credential.
    pub credential: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_backend: "http://localhost:3030".to_string(),
            ws_url: "ws://localhost:3030/ws".to_string(),
            storage_dir: None,
            credential: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by any `SKETCHROOM_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = lookup(ENV_HTTP_BACKEND) {
            config.http_backend = v;
        }
        if let Some(v) = lookup(ENV_WS_URL) {
            config.ws_url = v;
        }
        if let Some(v) = lookup(ENV_STORAGE_DIR) {
            config.storage_dir = Some(PathBuf::from(v));
        }
        config.credential = lookup(ENV_TOKEN);
        config
    }

    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The credential, or an empty string when there is none.
    pub fn credential(&self) -> &str {
        self.credential.as_deref().unwrap_or("")
    }

    pub fn http_backend_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.http_backend).map_err(|source| ConfigError::InvalidUrl {
            field: "http_backend",
            source,
        })
    }

    /// The relay URL with `?token=<credential>` appended (properly encoded).
    pub fn ws_url_with_token(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.ws_url).map_err(|source| ConfigError::InvalidUrl {
            field: "ws_url",
            source,
        })?;
        if let Some(token) = self.credential.as_deref() {
            url.query_pairs_mut().append_pair("token", token);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.http_backend_url().unwrap().as_str(), "http://localhost:3030/");
        assert_eq!(config.ws_url_with_token().unwrap().as_str(), "ws://localhost:3030/ws");
        assert_eq!(config.credential(), "");
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_HTTP_BACKEND, "https://draw.example.com"),
            (ENV_STORAGE_DIR, "/tmp/rooms"),
            (ENV_TOKEN, "abc"),
            (ENV_WS_URL, "  "),
        ]);
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.http_backend, "https://draw.example.com");
        assert_eq!(config.ws_url, ClientConfig::default().ws_url);
        assert_eq!(config.storage_dir, Some(PathBuf::from("/tmp/rooms")));
        assert_eq!(config.credential(), "abc");
    }

    #[test]
    fn test_token_is_encoded() {
        let config = ClientConfig {
            credential: Some("a b&c".to_string()),
            ..Default::default()
        };
        let url = config.ws_url_with_token().unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3030/ws?token=a+b%26c");
    }

    #[test]
    fn test_from_json_partial() {
        let config = ClientConfig::from_json(r#"{"ws_url":"wss://relay.example.com/ws"}"#).unwrap();
        assert_eq!(config.ws_url, "wss://relay.example.com/ws");
        assert_eq!(config.http_backend, "http://localhost:3030");
        assert!(config.credential.is_none());
    }

    #[test]
    fn test_invalid_urls() {
        assert!(ClientConfig::from_json("{").is_err());
        let config = ClientConfig {
            ws_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.ws_url_with_token(),
            Err(ConfigError::InvalidUrl { field: "ws_url", .. })
        ));
    }
}
