/*
[INPUT]:  A frame source, the shared router, and a cancellation token
[OUTPUT]: Routed messages until the socket closes; a terminal exit reason
[POS]:    WebSocket layer - background receive loop
[UPDATE]: When changing loop termination or per-message failure isolation
*/

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::reassembler::{Assembled, FrameReassembler, FrameSource};
use super::router::MessageRouter;

/// Why a receive loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The peer sent a close frame
    PeerClosed,
    /// The transport ended without a close frame
    StreamEnded,
    /// The owning connection left the open state
    ConnectionClosed,
    /// The owner's cancellation token fired
    Cancelled,
    /// The transport reported an error
    Transport(String),
}

/// Lifetime of the most recent receive loop.
///
/// `epoch` increments on every successful open, so a caller that reopens can
/// wait until the previous loop reports `running == false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderStatus {
    pub epoch: u64,
    pub running: bool,
    pub exit: Option<ReaderExit>,
}

impl ReaderStatus {
    pub(crate) fn running(epoch: u64) -> Self {
        Self {
            epoch,
            running: true,
            exit: None,
        }
    }
}

/// Drain `source` until close, cancellation, or `keep_running` turns false.
///
/// A message that fails to decode is reported and skipped, and the router
/// contains observer panics; only transport-level conditions end the loop.
pub async fn run_read_loop<F, K>(
    mut source: F,
    mut reassembler: FrameReassembler,
    router: &MessageRouter,
    cancel: &CancellationToken,
    keep_running: K,
) -> ReaderExit
where
    F: FrameSource,
    K: Fn() -> bool,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ReaderExit::Cancelled,
            next = source.next_frame() => next,
        };

        let frame = match next {
            None => return ReaderExit::StreamEnded,
            Some(Err(err)) => {
                warn!(error = %err, "ws read failed");
                return ReaderExit::Transport(err.to_string());
            }
            Some(Ok(frame)) => frame,
        };

        match reassembler.push(frame) {
            Assembled::Pending => continue,
            Assembled::Closed => {
                debug!("ws close frame received");
                return ReaderExit::PeerClosed;
            }
            Assembled::Discarded { bytes } => {
                warn!(bytes, "ws message exceeded size limit; discarded");
            }
            Assembled::Message(bytes) => {
                router.deliver(bytes);
            }
        }

        if !keep_running() {
            return ReaderExit::ConnectionClosed;
        }
    }
}
