/*
[INPUT]:  Endpoint, credentials, and timing options
[OUTPUT]: Validated connection configuration
[POS]:    WebSocket layer - connection configuration
[UPDATE]: When adding connection options or changing defaults
*/

use std::time::Duration;

use url::Url;

use crate::error::{Result, StreamError};

/// Production market data and user order endpoint
pub const DEFAULT_STREAM_URL: &str = "wss://advanced-trade-ws.coinbase.com";

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Also handed to tungstenite as its message and frame cap. On a live socket
/// tungstenite rejects an oversized message itself and the reader stops with
/// `ReaderExit::Transport`; `FrameReassembler` discards oversized messages
/// only for sources that deliver raw fragments.
const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Credentials used to sign control messages
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Stream connection configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub credentials: Credentials,
    pub handshake_timeout: Duration,
    pub close_timeout: Duration,
    /// Upper bound for one reassembled message
    pub max_message_bytes: usize,
}

impl StreamConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            credentials,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Check the endpoint scheme and numeric bounds
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(StreamError::Config(format!(
                "stream url must use ws or wss, got {}",
                url.scheme()
            )));
        }
        if self.credentials.api_key.is_empty() {
            return Err(StreamError::Config("api_key must not be empty".to_string()));
        }
        if self.credentials.api_secret.is_empty() {
            return Err(StreamError::Config("api_secret must not be empty".to_string()));
        }
        if self.handshake_timeout.is_zero() || self.close_timeout.is_zero() {
            return Err(StreamError::Config("timeouts must be non-zero".to_string()));
        }
        if self.max_message_bytes == 0 {
            return Err(StreamError::Config(
                "max_message_bytes must be non-zero".to_string(),
            ));
        }
        Ok(url)
    }
}
