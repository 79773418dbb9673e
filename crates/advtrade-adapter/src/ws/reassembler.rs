/*
[INPUT]:  Raw socket frames (fragments, final fragments, close frames)
[OUTPUT]: Complete logical messages as contiguous byte buffers
[POS]:    WebSocket layer - inbound frame reassembly
[UPDATE]: When changing fragment handling or the frame source contract
*/

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

use crate::error::StreamError;

/// One read from the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    Data { bytes: Vec<u8>, is_final: bool },
    Close,
}

impl RawFrame {
    /// A fragment that more frames will follow
    pub fn partial(bytes: impl Into<Vec<u8>>) -> Self {
        RawFrame::Data {
            bytes: bytes.into(),
            is_final: false,
        }
    }

    /// The last fragment of a transmission
    pub fn last(bytes: impl Into<Vec<u8>>) -> Self {
        RawFrame::Data {
            bytes: bytes.into(),
            is_final: true,
        }
    }
}

/// Result of feeding one frame into the reassembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    /// More fragments are needed
    Pending,
    /// A full transmission, in arrival order
    Message(Vec<u8>),
    /// The peer sent a close frame; buffered fragments were dropped
    Closed,
    /// The transmission grew past the size limit and was dropped
    Discarded { bytes: usize },
}

/// Accumulates fragments until a final flag arrives
#[derive(Debug)]
pub struct FrameReassembler {
    segments: Vec<Vec<u8>>,
    buffered: usize,
    max_message_bytes: usize,
    discarding: bool,
}

impl FrameReassembler {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            segments: Vec::new(),
            buffered: 0,
            max_message_bytes,
            discarding: false,
        }
    }

    /// Bytes held for the transmission in progress
    pub fn buffered_bytes(&self) -> usize {
        self.buffered
    }

    pub fn push(&mut self, frame: RawFrame) -> Assembled {
        let (bytes, is_final) = match frame {
            RawFrame::Close => {
                self.reset();
                return Assembled::Closed;
            }
            RawFrame::Data { bytes, is_final } => (bytes, is_final),
        };

        self.buffered += bytes.len();
        if self.buffered > self.max_message_bytes {
            // Keep counting so the final report covers the whole transmission.
            self.segments.clear();
            self.discarding = true;
        } else if !self.discarding {
            self.segments.push(bytes);
        }

        if !is_final {
            return Assembled::Pending;
        }

        if self.discarding {
            let bytes = self.buffered;
            self.reset();
            return Assembled::Discarded { bytes };
        }

        let message = if self.segments.len() == 1 {
            self.segments.pop().unwrap_or_default()
        } else {
            self.segments.concat()
        };
        self.reset();
        Assembled::Message(message)
    }

    pub fn reset(&mut self) {
        self.segments.clear();
        self.buffered = 0;
        self.discarding = false;
    }
}

/// Single-reader source of raw frames
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, `None` once the transport has ended
    async fn next_frame(&mut self) -> Option<Result<RawFrame, StreamError>>;
}

/// Adapts the read half of a tungstenite stream into raw frames
#[derive(Debug)]
pub struct WsFrameSource<S> {
    inner: S,
}

impl<S> WsFrameSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> FrameSource for WsFrameSource<S>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin + Send,
{
    async fn next_frame(&mut self) -> Option<Result<RawFrame, StreamError>> {
        loop {
            let message = match self.inner.next().await? {
                Ok(message) => message,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(err) => return Some(Err(StreamError::connection(err.to_string()))),
            };

            let frame = match message {
                WsMessage::Text(text) => RawFrame::last(text.as_bytes()),
                WsMessage::Binary(bytes) => RawFrame::last(bytes.to_vec()),
                WsMessage::Frame(frame) => RawFrame::Data {
                    is_final: frame.header().is_final,
                    bytes: frame.payload().to_vec(),
                },
                WsMessage::Close(_) => RawFrame::Close,
                // Control traffic is answered by tungstenite itself.
                WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            };
            return Some(Ok(frame));
        }
    }
}
