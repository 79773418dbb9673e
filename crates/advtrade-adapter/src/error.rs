/*
[INPUT]:  Error sources (arguments, handshake, socket I/O, payload decoding)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

use crate::types::ChannelKind;

/// Main error type for the streaming adapter
#[derive(Error, Debug)]
pub enum StreamError {
    /// Invalid input to a public call
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Handshake or close handshake failed
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Handshake or close handshake did not finish in time
    #[error("Connection timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Writing a control message to an open socket failed
    #[error("Failed to send {action} for channel {channel}: {message}")]
    Send {
        action: &'static str,
        channel: ChannelKind,
        message: String,
    },

    /// A recognized channel's payload did not match its typed shape
    #[error("Failed to decode {channel} message: {source}")]
    Decode {
        channel: ChannelKind,
        #[source]
        source: serde_json::Error,
    },

    /// A reassembled message was not valid UTF-8
    #[error("Inbound message is not valid UTF-8 ({bytes} bytes)")]
    InvalidUtf8 { bytes: usize },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The owning cancellation token fired while the call was suspended
    #[error("Operation cancelled")]
    Cancelled,
}

impl StreamError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamError::Connection { .. } | StreamError::Timeout { .. } | StreamError::Send { .. }
        )
    }

    /// Check if error came from the transport rather than from caller input
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StreamError::Connection { .. }
                | StreamError::Timeout { .. }
                | StreamError::Send { .. }
                | StreamError::Cancelled
        )
    }

    /// Check if error is scoped to a single inbound message
    pub fn is_message_error(&self) -> bool {
        matches!(
            self,
            StreamError::Decode { .. } | StreamError::InvalidUtf8 { .. }
        )
    }

    pub(crate) fn connection(message: impl Into<String>) -> Self {
        StreamError::Connection {
            message: message.into(),
        }
    }

    pub(crate) fn argument(message: impl Into<String>) -> Self {
        StreamError::Argument(message.into())
    }
}

/// Result type alias for streaming operations
pub type Result<T> = std::result::Result<T, StreamError>;
