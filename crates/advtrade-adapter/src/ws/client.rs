/*
[INPUT]:  Stream configuration, credentials, and caller subscriptions
[OUTPUT]: One managed socket with signed control messages and routed inbound data
[POS]:    WebSocket layer - connection lifecycle and control protocol
[UPDATE]: When changing open/close semantics, locking, or control message flow
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::StreamConfig;
use super::message::log_control_sent;
use super::reader::{ReaderExit, ReaderStatus, run_read_loop};
use super::reassembler::{FrameReassembler, WsFrameSource};
use super::router::MessageRouter;
use crate::auth::HmacSigner;
use crate::error::{Result, StreamError};
use crate::types::{ConnectionState, ControlMessage, ControlType, IntoChannel};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;

/// Everything administrative calls touch, behind one lock
#[derive(Default)]
struct AdminState {
    writer: Option<WsWriter>,
    reader: Option<JoinHandle<ReaderExit>>,
    epoch: u64,
}

/// Holds a transient state and falls back to `Closed` unless completed.
///
/// A caller that drops an in-flight `open` or `close` future never leaves the
/// connection in `Connecting` or `Closing`.
struct TransitionGuard<'a> {
    state: &'a AtomicU8,
    armed: bool,
}

impl<'a> TransitionGuard<'a> {
    fn enter(state: &'a AtomicU8, transient: ConnectionState) -> Self {
        state.store(transient.as_u8(), Ordering::Release);
        Self { state, armed: true }
    }

    fn complete(mut self, settled: ConnectionState) {
        self.state.store(settled.as_u8(), Ordering::Release);
        self.armed = false;
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .store(ConnectionState::Closed.as_u8(), Ordering::Release);
        }
    }
}

/// Streaming client for market data and order updates.
///
/// `open`, `close`, `subscribe`, and `unsubscribe` are serialized through a
/// single async mutex that also owns the write half of the socket. The read
/// half lives in a background task and never takes that lock.
pub struct StreamClient {
    config: StreamConfig,
    signer: HmacSigner,
    router: Arc<MessageRouter>,
    state: Arc<AtomicU8>,
    admin: Mutex<AdminState>,
    reader_status: Arc<watch::Sender<ReaderStatus>>,
    cancel: CancellationToken,
}

impl StreamClient {
    /// Create a closed client with its own router
    pub fn new(config: StreamConfig) -> Result<Self> {
        Self::with_router(config, Arc::new(MessageRouter::new()), CancellationToken::new())
    }

    /// Create a closed client that dispatches into `router`.
    ///
    /// Cancelling `cancel` aborts any suspended call and stops the read loop.
    pub fn with_router(
        config: StreamConfig,
        router: Arc<MessageRouter>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        let signer = HmacSigner::new(&config.credentials.api_secret)?;
        let (reader_status, _rx) = watch::channel(ReaderStatus::default());

        Ok(Self {
            config,
            signer,
            router,
            state: Arc::new(AtomicU8::new(ConnectionState::Closed.as_u8())),
            admin: Mutex::new(AdminState::default()),
            reader_status: Arc::new(reader_status),
            cancel: cancel.child_token(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Registration point for raw, typed, and error observers
    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Watch the lifetime of the current receive loop
    pub fn reader_status(&self) -> watch::Receiver<ReaderStatus> {
        self.reader_status.subscribe()
    }

    /// Wait until the most recently started receive loop has exited
    pub async fn wait_for_reader_exit(&self) -> Option<ReaderExit> {
        let mut rx = self.reader_status.subscribe();
        let status = rx.wait_for(|status| !status.running).await.ok()?;
        status.exit.clone()
    }

    /// Open the socket and start the receive loop. No-op when already open.
    pub async fn open(&self) -> Result<()> {
        let mut admin = self.admin.lock().await;
        if self.state() == ConnectionState::Open {
            debug!(url = %self.config.url, "ws open ignored; already open");
            return Ok(());
        }

        let url = self.config.validate()?;
        let transition = TransitionGuard::enter(&self.state, ConnectionState::Connecting);

        let stream = match self.handshake(url.as_str()).await {
            Ok(stream) => stream,
            Err(err) => {
                drop(transition);
                warn!(url = %self.config.url, error = %err, "ws handshake failed");
                return Err(err);
            }
        };

        if let Some(previous) = admin.reader.take()
            && !previous.is_finished()
        {
            debug!(epoch = admin.epoch, "previous ws reader still draining");
        }

        let (writer, reader) = stream.split();
        admin.epoch += 1;
        let epoch = admin.epoch;
        admin.writer = Some(writer);

        // Publish the new epoch before flipping state so a stale reader
        // cannot mark this connection closed.
        self.reader_status.send_replace(ReaderStatus::running(epoch));
        transition.complete(ConnectionState::Open);

        let router = self.router.clone();
        let state = self.state.clone();
        let status = self.reader_status.clone();
        let cancel = self.cancel.child_token();
        let reassembler = FrameReassembler::new(self.config.max_message_bytes);

        let handle = tokio::spawn(async move {
            let keep_running = || {
                matches!(
                    ConnectionState::from_u8(state.load(Ordering::Acquire)),
                    ConnectionState::Open | ConnectionState::Closing
                )
            };
            let exit = run_read_loop(
                WsFrameSource::new(reader),
                reassembler,
                &router,
                &cancel,
                keep_running,
            )
            .await;

            status.send_if_modified(|current| {
                if current.epoch != epoch {
                    return false;
                }
                let _ = state.compare_exchange(
                    ConnectionState::Open.as_u8(),
                    ConnectionState::Closed.as_u8(),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                current.running = false;
                current.exit = Some(exit.clone());
                true
            });
            info!(epoch, exit = ?exit, "ws reader stopped");
            exit
        });
        admin.reader = Some(handle);

        info!(url = %self.config.url, epoch, "ws connected");
        Ok(())
    }

    /// Close the socket with a normal-closure handshake. No-op when closed.
    pub async fn close(&self) -> Result<()> {
        let mut admin = self.admin.lock().await;
        if self.state() == ConnectionState::Closed {
            // Peer-initiated close already ran; release the stale write half.
            admin.writer = None;
            debug!("ws close ignored; already closed");
            return Ok(());
        }

        let Some(mut writer) = admin.writer.take() else {
            self.set_state(ConnectionState::Closed);
            return Ok(());
        };
        let transition = TransitionGuard::enter(&self.state, ConnectionState::Closing);

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        let result = self
            .with_deadline(self.config.close_timeout, async move {
                match writer.send(WsMessage::Close(Some(frame))).await {
                    Ok(()) => Ok(()),
                    Err(
                        tokio_tungstenite::tungstenite::Error::ConnectionClosed
                        | tokio_tungstenite::tungstenite::Error::AlreadyClosed,
                    ) => Ok(()),
                    Err(err) => Err(StreamError::connection(format!(
                        "close handshake failed: {err}"
                    ))),
                }
            })
            .await;
        transition.complete(ConnectionState::Closed);

        match result {
            Ok(()) => {
                info!(epoch = admin.epoch, "ws closed");
                Ok(())
            }
            Err(err) => {
                warn!(epoch = admin.epoch, error = %err, "ws close failed");
                Err(err)
            }
        }
    }

    /// Subscribe to `channel` for `product_ids`.
    ///
    /// Returns without sending anything when the connection is not open.
    pub async fn subscribe<I, S, C>(&self, product_ids: I, channel: C) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: IntoChannel,
    {
        self.send_control(ControlType::Subscribe, product_ids, channel)
            .await
    }

    /// Unsubscribe from `channel` for `product_ids`.
    ///
    /// Returns without sending anything when the connection is not open.
    pub async fn unsubscribe<I, S, C>(&self, product_ids: I, channel: C) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: IntoChannel,
    {
        self.send_control(ControlType::Unsubscribe, product_ids, channel)
            .await
    }

    async fn send_control<I, S, C>(
        &self,
        control_type: ControlType,
        product_ids: I,
        channel: C,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: IntoChannel,
    {
        let channel = channel.into_channel()?;
        let product_ids: Vec<String> = product_ids.into_iter().map(Into::into).collect();

        let mut admin = self.admin.lock().await;
        if self.state() != ConnectionState::Open {
            debug!(
                action = control_type.as_str(),
                %channel,
                state = %self.state(),
                "ws control message skipped; not open"
            );
            return Ok(());
        }
        let Some(writer) = admin.writer.as_mut() else {
            return Ok(());
        };

        let message = ControlMessage::signed(
            control_type,
            channel,
            &product_ids,
            &self.config.credentials.api_key,
            Utc::now().timestamp(),
            &self.signer,
        )?;
        let text = message.to_json()?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(StreamError::Cancelled),
            sent = writer.send(WsMessage::Text(text.into())) => {
                sent.map_err(|err| StreamError::Send {
                    action: control_type.as_str(),
                    channel,
                    message: err.to_string(),
                })?;
            }
        }

        log_control_sent(&message);
        Ok(())
    }

    async fn handshake(&self, url: &str) -> Result<WsStream> {
        // tungstenite reassembles fragments itself, so the limit must be
        // enforced there to bound memory on the live socket.
        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(self.config.max_message_bytes))
            .max_frame_size(Some(self.config.max_message_bytes));
        self.with_deadline(self.config.handshake_timeout, async {
            connect_async_with_config(url, Some(ws_config), false)
                .await
                .map(|(stream, _response)| stream)
                .map_err(|err| StreamError::connection(format!("handshake failed: {err}")))
        })
        .await
    }

    async fn with_deadline<T>(
        &self,
        deadline: Duration,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StreamError::Cancelled),
            outcome = tokio::time::timeout(deadline, operation) => match outcome {
                Ok(result) => result,
                Err(_) => Err(StreamError::Timeout {
                    duration_ms: deadline.as_millis() as u64,
                }),
            },
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .field("reader", &*self.reader_status.borrow())
            .finish_non_exhaustive()
    }
}
