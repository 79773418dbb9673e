/*
[INPUT]:  Stream configuration and subscription channels
[OUTPUT]: Real-time market data and order updates
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod client;
pub mod config;
pub(crate) mod message;
pub mod reader;
pub mod reassembler;
pub mod router;

pub use client::StreamClient;
pub use config::{Credentials, DEFAULT_STREAM_URL, StreamConfig};
pub use reader::{ReaderExit, ReaderStatus, run_read_loop};
pub use reassembler::{Assembled, FrameReassembler, FrameSource, RawFrame, WsFrameSource};
pub use router::{MessageRouter, RouteOutcome, channel_of};
