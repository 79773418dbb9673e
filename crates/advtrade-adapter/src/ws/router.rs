/*
[INPUT]:  Reassembled inbound messages (bytes and UTF-8 text)
[OUTPUT]: Raw and typed callback invocations, per-message error reports
[POS]:    WebSocket layer - discriminated dispatch by channel
[UPDATE]: When adding channels or changing observer semantics
*/

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::message::{
    log_message_failure_once, log_message_sample_once, log_observer_panic_once, log_unrouted_once,
};
use crate::error::{Result, StreamError};
use crate::types::{
    CandlesEvent, ChannelKind, HeartbeatEvent, Level2Event, MarketTradesEvent, StatusEvent,
    StreamEnvelope, TickerEvent, UserEvent,
};

pub type RawBytesCallback = dyn Fn(&[u8]) + Send + Sync;
pub type RawMessageCallback = dyn Fn(&str) + Send + Sync;
pub type ErrorCallback = dyn Fn(&StreamError) + Send + Sync;
pub type TypedCallback<E> = dyn Fn(&StreamEnvelope<E>) + Send + Sync;

/// What the router did with one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Typed decoding ran and `observers` callbacks were invoked
    Dispatched {
        channel: ChannelKind,
        observers: usize,
    },
    /// Recognized channel with no typed observers; decoded only when error
    /// observers are registered
    NoObservers { channel: ChannelKind },
    /// Missing or unrecognized discriminator
    Unrouted,
    /// Payload could not be decoded; reported to error observers
    Failed,
}

/// Ordered callback list that tolerates registration during dispatch
struct Observers<F: ?Sized> {
    list: RwLock<Vec<Arc<F>>>,
}

impl<F: ?Sized> Observers<F> {
    fn new() -> Self {
        Self {
            list: RwLock::new(Vec::new()),
        }
    }

    fn push(&self, callback: Arc<F>) {
        self.list
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    // Callbacks run outside the lock so they may register further observers.
    fn snapshot(&self) -> Vec<Arc<F>> {
        self.list
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len(&self) -> usize {
        self.list.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run one observer, containing a panic to that single invocation
fn invoke_isolated(observer: &'static str, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        log_observer_panic_once(observer);
    }
}

/// Decoder plus observers for one channel
trait Route: Send + Sync {
    fn observer_count(&self) -> usize;
    /// Decode `text` when typed observers exist or `validate` is set.
    fn dispatch(
        &self,
        channel: ChannelKind,
        text: &str,
        validate: bool,
    ) -> Result<Option<(u64, usize)>>;
}

struct TypedRoute<E> {
    observers: Observers<TypedCallback<E>>,
}

impl<E> TypedRoute<E> {
    fn new() -> Self {
        Self {
            observers: Observers::new(),
        }
    }
}

impl<E> Route for TypedRoute<E>
where
    E: DeserializeOwned + Send + Sync + 'static,
{
    fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn dispatch(
        &self,
        channel: ChannelKind,
        text: &str,
        validate: bool,
    ) -> Result<Option<(u64, usize)>> {
        let observers = self.observers.snapshot();
        if observers.is_empty() && !validate {
            return Ok(None);
        }

        let envelope: StreamEnvelope<E> = serde_json::from_str(text)
            .map_err(|source| StreamError::Decode { channel, source })?;
        if observers.is_empty() {
            return Ok(None);
        }
        for callback in &observers {
            invoke_isolated(channel.wire_name(), || callback(&envelope));
        }
        Ok(Some((envelope.sequence_num, observers.len())))
    }
}

/// One entry per channel, fixed for the router's lifetime
struct DispatchTable {
    candles: TypedRoute<CandlesEvent>,
    heartbeats: TypedRoute<HeartbeatEvent>,
    market_trades: TypedRoute<MarketTradesEvent>,
    status: TypedRoute<StatusEvent>,
    ticker: TypedRoute<TickerEvent>,
    ticker_batch: TypedRoute<TickerEvent>,
    level2: TypedRoute<Level2Event>,
    user: TypedRoute<UserEvent>,
}

impl DispatchTable {
    fn new() -> Self {
        Self {
            candles: TypedRoute::new(),
            heartbeats: TypedRoute::new(),
            market_trades: TypedRoute::new(),
            status: TypedRoute::new(),
            ticker: TypedRoute::new(),
            ticker_batch: TypedRoute::new(),
            level2: TypedRoute::new(),
            user: TypedRoute::new(),
        }
    }

    fn route(&self, channel: ChannelKind) -> &dyn Route {
        match channel {
            ChannelKind::Candles => &self.candles,
            ChannelKind::Heartbeats => &self.heartbeats,
            ChannelKind::MarketTrades => &self.market_trades,
            ChannelKind::Status => &self.status,
            ChannelKind::Ticker => &self.ticker,
            ChannelKind::TickerBatch => &self.ticker_batch,
            ChannelKind::Level2 => &self.level2,
            ChannelKind::User => &self.user,
        }
    }
}

#[derive(Deserialize)]
struct Discriminator {
    #[serde(default)]
    channel: Option<String>,
}

/// Extract the top-level `channel` field without decoding the payload
pub fn channel_of(text: &str) -> Option<ChannelKind> {
    let discriminator: Discriminator = serde_json::from_str(text).ok()?;
    ChannelKind::from_wire(discriminator.channel.as_deref()?)
}

/// Routes logical messages to raw and per-channel observers
pub struct MessageRouter {
    table: DispatchTable,
    raw_bytes: Observers<RawBytesCallback>,
    raw_messages: Observers<RawMessageCallback>,
    errors: Observers<ErrorCallback>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            table: DispatchTable::new(),
            raw_bytes: Observers::new(),
            raw_messages: Observers::new(),
            errors: Observers::new(),
        }
    }

    /// Observe every reassembled message before UTF-8 decoding
    pub fn on_raw_bytes(&self, callback: impl Fn(&[u8]) + Send + Sync + 'static) {
        self.raw_bytes.push(Arc::new(callback));
    }

    /// Observe every message text, routed or not
    pub fn on_raw_message(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.raw_messages.push(Arc::new(callback));
    }

    /// Observe per-message failures (decode errors, invalid UTF-8)
    pub fn on_error(&self, callback: impl Fn(&StreamError) + Send + Sync + 'static) {
        self.errors.push(Arc::new(callback));
    }

    pub fn on_candles(&self, callback: impl Fn(&StreamEnvelope<CandlesEvent>) + Send + Sync + 'static) {
        self.table.candles.observers.push(Arc::new(callback));
    }

    pub fn on_heartbeats(
        &self,
        callback: impl Fn(&StreamEnvelope<HeartbeatEvent>) + Send + Sync + 'static,
    ) {
        self.table.heartbeats.observers.push(Arc::new(callback));
    }

    pub fn on_market_trades(
        &self,
        callback: impl Fn(&StreamEnvelope<MarketTradesEvent>) + Send + Sync + 'static,
    ) {
        self.table.market_trades.observers.push(Arc::new(callback));
    }

    pub fn on_status(&self, callback: impl Fn(&StreamEnvelope<StatusEvent>) + Send + Sync + 'static) {
        self.table.status.observers.push(Arc::new(callback));
    }

    pub fn on_ticker(&self, callback: impl Fn(&StreamEnvelope<TickerEvent>) + Send + Sync + 'static) {
        self.table.ticker.observers.push(Arc::new(callback));
    }

    pub fn on_ticker_batch(
        &self,
        callback: impl Fn(&StreamEnvelope<TickerEvent>) + Send + Sync + 'static,
    ) {
        self.table.ticker_batch.observers.push(Arc::new(callback));
    }

    pub fn on_level2(&self, callback: impl Fn(&StreamEnvelope<Level2Event>) + Send + Sync + 'static) {
        self.table.level2.observers.push(Arc::new(callback));
    }

    pub fn on_user(&self, callback: impl Fn(&StreamEnvelope<UserEvent>) + Send + Sync + 'static) {
        self.table.user.observers.push(Arc::new(callback));
    }

    /// Number of typed observers registered for a channel
    pub fn observer_count(&self, channel: ChannelKind) -> usize {
        self.table.route(channel).observer_count()
    }

    /// Handle one reassembled transmission straight off the socket
    pub fn deliver(&self, bytes: Vec<u8>) -> RouteOutcome {
        for callback in self.raw_bytes.snapshot() {
            invoke_isolated("raw_bytes", || callback(&bytes));
        }

        match String::from_utf8(bytes) {
            Ok(text) => self.route(&text),
            Err(err) => {
                let failure = StreamError::InvalidUtf8 {
                    bytes: err.as_bytes().len(),
                };
                self.report(&failure, None);
                RouteOutcome::Failed
            }
        }
    }

    /// Dispatch one decoded message by its `channel` discriminator.
    ///
    /// A recognized payload is decoded whenever typed or error observers are
    /// registered, so schema drift reaches `on_error` even on channels nobody
    /// consumes.
    pub fn route(&self, text: &str) -> RouteOutcome {
        for callback in self.raw_messages.snapshot() {
            invoke_isolated("raw_message", || callback(text));
        }

        let Some(channel) = channel_of(text) else {
            log_unrouted_once(text);
            return RouteOutcome::Unrouted;
        };

        let validate = !self.errors.is_empty();
        match self.table.route(channel).dispatch(channel, text, validate) {
            Ok(Some((sequence, observers))) => {
                log_message_sample_once(channel, Some(sequence), text.len());
                RouteOutcome::Dispatched { channel, observers }
            }
            Ok(None) => {
                log_message_sample_once(channel, None, text.len());
                RouteOutcome::NoObservers { channel }
            }
            Err(err) => {
                self.report(&err, Some(text));
                RouteOutcome::Failed
            }
        }
    }

    fn report(&self, err: &StreamError, raw: Option<&str>) {
        log_message_failure_once(err, raw);
        for callback in self.errors.snapshot() {
            invoke_isolated("error", || callback(err));
        }
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("raw_bytes", &self.raw_bytes.len())
            .field("raw_messages", &self.raw_messages.len())
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}
