/*
[INPUT]:  Stream configuration, subscription list, shutdown token
[OUTPUT]: Logged stream traffic until shutdown or connection loss
[POS]:    Runtime - drives one StreamClient for the tail binary
[UPDATE]: When changing observer logging or the run/shutdown sequence
*/

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use advtrade_adapter::{
    ChannelKind, MessageRouter, ReaderExit, StreamClient, StreamConfig, StreamEnvelope,
};

use crate::config::SubscriptionConfig;
use crate::metrics::{TailMetrics, TailMetricsSnapshot};

/// How a tail run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailExit {
    /// The shutdown token fired and the socket was closed normally
    Shutdown,
    /// The receive loop stopped on its own
    ConnectionLost(Option<ReaderExit>),
}

pub struct Tail {
    client: StreamClient,
    subscriptions: Vec<SubscriptionConfig>,
    metrics: Arc<Mutex<TailMetrics>>,
    shutdown: CancellationToken,
}

impl Tail {
    /// Build a closed client and register logging observers.
    ///
    /// `shutdown` is not handed to the client so that a requested shutdown can
    /// still complete the close handshake.
    pub fn new(
        config: StreamConfig,
        subscriptions: Vec<SubscriptionConfig>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let router = Arc::new(MessageRouter::new());
        let metrics = Arc::new(Mutex::new(TailMetrics::default()));
        register_observers(&router, &metrics);

        let client = StreamClient::with_router(config, router, CancellationToken::new())
            .context("create stream client")?;

        Ok(Self {
            client,
            subscriptions,
            metrics,
            shutdown,
        })
    }

    pub fn client(&self) -> &StreamClient {
        &self.client
    }

    pub fn metrics(&self) -> TailMetricsSnapshot {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Connect, subscribe, and log traffic until shutdown or disconnect
    pub async fn run(&self) -> Result<TailExit> {
        self.client.open().await.context("open stream")?;

        for subscription in &self.subscriptions {
            self.client
                .subscribe(subscription.product_ids.clone(), subscription.channel)
                .await
                .with_context(|| format!("subscribe {}", subscription.channel))?;
            info!(
                channel = %subscription.channel,
                products = %subscription.product_ids.join(","),
                "subscribed"
            );
        }

        let exit = tokio::select! {
            _ = self.shutdown.cancelled() => {
                info!("shutdown requested");
                TailExit::Shutdown
            }
            exit = self.client.wait_for_reader_exit() => {
                warn!(exit = ?exit, "stream reader stopped");
                TailExit::ConnectionLost(exit)
            }
        };

        self.client.close().await.context("close stream")?;

        let snapshot = self.metrics();
        info!(
            messages = snapshot.messages,
            errors = snapshot.errors,
            last_sequence = ?snapshot.last_sequence,
            "tail finished"
        );
        Ok(exit)
    }
}

fn register_observers(router: &MessageRouter, metrics: &Arc<Mutex<TailMetrics>>) {
    let shared = metrics.clone();
    router.on_raw_message(move |text| {
        debug!(bytes = text.len(), "stream message");
        with_metrics(&shared, TailMetrics::record_raw);
    });

    let shared = metrics.clone();
    router.on_error(move |err| {
        warn!(error = %err, "stream message failed");
        with_metrics(&shared, TailMetrics::record_error);
    });

    let shared = metrics.clone();
    router.on_heartbeats(move |message| {
        record(&shared, ChannelKind::Heartbeats, message);
        if let Some(event) = message.events.last() {
            debug!(counter = event.heartbeat_counter, "heartbeat");
            with_metrics(&shared, |m| m.record_heartbeat(event.heartbeat_counter));
        }
    });

    let shared = metrics.clone();
    router.on_ticker(move |message| {
        record(&shared, ChannelKind::Ticker, message);
        for ticker in message.events.iter().flat_map(|event| &event.tickers) {
            info!(
                product = %ticker.product_id,
                price = %ticker.price,
                best_bid = ?ticker.best_bid,
                best_ask = ?ticker.best_ask,
                "ticker"
            );
        }
    });

    let shared = metrics.clone();
    router.on_ticker_batch(move |message| {
        record(&shared, ChannelKind::TickerBatch, message);
        let tickers: usize = message.events.iter().map(|event| event.tickers.len()).sum();
        info!(tickers, sequence = message.sequence_num, "ticker batch");
    });

    let shared = metrics.clone();
    router.on_level2(move |message| {
        record(&shared, ChannelKind::Level2, message);
        for event in &message.events {
            info!(
                product = %event.product_id,
                kind = ?event.event_type,
                updates = event.updates.len(),
                "level2"
            );
        }
    });

    let shared = metrics.clone();
    router.on_market_trades(move |message| {
        record(&shared, ChannelKind::MarketTrades, message);
        for trade in message.events.iter().flat_map(|event| &event.trades) {
            info!(
                product = %trade.product_id,
                price = %trade.price,
                size = %trade.size,
                side = ?trade.side,
                "trade"
            );
        }
    });

    let shared = metrics.clone();
    router.on_candles(move |message| {
        record(&shared, ChannelKind::Candles, message);
        for candle in message.events.iter().flat_map(|event| &event.candles) {
            info!(
                product = %candle.product_id,
                start = candle.start,
                close = %candle.close,
                "candle"
            );
        }
    });

    let shared = metrics.clone();
    router.on_status(move |message| {
        record(&shared, ChannelKind::Status, message);
        for product in message.events.iter().flat_map(|event| &event.products) {
            info!(product = %product.id, status = %product.status, "product status");
        }
    });

    let shared = metrics.clone();
    router.on_user(move |message| {
        record(&shared, ChannelKind::User, message);
        let orders: usize = message.events.iter().map(|event| event.orders.len()).sum();
        info!(orders, sequence = message.sequence_num, "user orders");
    });
}

fn record<E>(metrics: &Mutex<TailMetrics>, channel: ChannelKind, message: &StreamEnvelope<E>) {
    with_metrics(metrics, |m| m.record_typed(channel, message.sequence_num));
}

fn with_metrics(metrics: &Mutex<TailMetrics>, update: impl FnOnce(&mut TailMetrics)) {
    let mut guard = metrics.lock().unwrap_or_else(PoisonError::into_inner);
    update(&mut guard);
}
