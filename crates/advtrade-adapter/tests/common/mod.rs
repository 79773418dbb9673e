/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and a local WebSocket server
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for advtrade-adapter tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use advtrade_adapter::{Credentials, StreamConfig};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const TEST_API_KEY: &str = "organizations/test/apiKeys/key-1";
pub const TEST_API_SECRET: &str = "s3cr3t";

/// Commands pushed from a test into the active server connection
#[derive(Debug)]
pub enum ServerCommand {
    Text(String),
    Close,
}

/// Local WebSocket endpoint that records every text message it receives
pub struct MockStreamServer {
    pub url: String,
    received: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    commands: mpsc::UnboundedSender<ServerCommand>,
    handle: JoinHandle<()>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let received = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (commands, command_rx) = mpsc::unbounded_channel();
        let command_rx = Arc::new(Mutex::new(command_rx));

        let handle = tokio::spawn({
            let received = received.clone();
            let connections = connections.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let Ok(ws) = accept_async(stream).await else {
                        continue;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let received = received.clone();
                    let command_rx = command_rx.clone();
                    tokio::spawn(async move {
                        let (mut write, mut read) = ws.split();
                        let mut command_rx = command_rx.lock().await;
                        loop {
                            tokio::select! {
                                command = command_rx.recv() => match command {
                                    Some(ServerCommand::Text(text)) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Some(ServerCommand::Close) => {
                                        let _ = write.send(Message::Close(None)).await;
                                    }
                                    None => break,
                                },
                                incoming = read.next() => match incoming {
                                    Some(Ok(Message::Text(text))) => {
                                        received.lock().await.push(text.to_string());
                                    }
                                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                },
                            }
                        }
                    });
                }
            }
        });

        Self {
            url: format!("ws://127.0.0.1:{port}"),
            received,
            connections,
            commands,
            handle,
        }
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.commands.send(ServerCommand::Text(text.into())).unwrap();
    }

    pub fn push_close(&self) {
        self.commands.send(ServerCommand::Close).unwrap();
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    /// Poll until `count` messages arrived or the timeout elapses
    pub async fn wait_for_messages(&self, count: usize) -> Vec<String> {
        let _ = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.received.lock().await.len() >= count {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        self.received().await
    }
}

impl Drop for MockStreamServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn test_config(url: &str) -> StreamConfig {
    StreamConfig::new(Credentials::new(TEST_API_KEY, TEST_API_SECRET))
        .with_url(url)
        .with_handshake_timeout(Duration::from_secs(2))
        .with_close_timeout(Duration::from_secs(2))
}

/// Wait until `condition` holds, polling every 10ms for up to 5s
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

/// A minimal well-formed message for every channel
pub fn sample_message(wire_name: &str) -> String {
    let events = match wire_name {
        "candles" => serde_json::json!([{
            "type": "snapshot",
            "candles": [{
                "start": "1688998200", "high": "1867.72", "low": "1865.63",
                "open": "1867.38", "close": "1866.81", "volume": "0.20269406",
                "product_id": "ETH-USD"
            }]
        }]),
        "heartbeats" => serde_json::json!([{
            "current_time": "2023-06-23 20:31:56.121961769 +0000 UTC m=+91717.525857105",
            "heartbeat_counter": "3049"
        }]),
        "market_trades" => serde_json::json!([{
            "type": "snapshot",
            "trades": [{
                "trade_id": "000000000", "product_id": "ETH-USD", "price": "1260.01",
                "size": "0.3", "side": "BUY", "time": "2019-08-14T20:42:27.265Z"
            }]
        }]),
        "status" => serde_json::json!([{
            "type": "snapshot",
            "products": [{
                "product_type": "SPOT", "id": "BTC-USD", "base_currency": "BTC",
                "quote_currency": "USD", "base_increment": "0.00000001",
                "quote_increment": "0.01", "display_name": "BTC/USD", "status": "online",
                "status_message": "", "min_market_funds": "1"
            }]
        }]),
        "ticker" | "ticker_batch" => serde_json::json!([{
            "type": "snapshot",
            "tickers": [{
                "type": "ticker", "product_id": "BTC-USD", "price": "21932.98",
                "volume_24_h": "16038.28770938", "low_24_h": "21835.29",
                "high_24_h": "23011.18", "low_52_w": "15460", "high_52_w": "48240",
                "price_percent_chg_24_h": "-4.15775596190603"
            }]
        }]),
        "level2" | "l2_data" => serde_json::json!([{
            "type": "update",
            "product_id": "BTC-USD",
            "updates": [{
                "side": "bid", "event_time": "1970-01-01T00:00:00Z",
                "price_level": "21921.73", "new_quantity": "0.06317902"
            }]
        }]),
        "user" => serde_json::json!([{
            "type": "snapshot",
            "orders": [{
                "order_id": "XXX", "client_order_id": "YYY", "cumulative_quantity": "0",
                "leaves_quantity": "0.000994", "avg_price": "0", "total_fees": "0",
                "status": "OPEN", "product_id": "BTC-USD",
                "creation_time": "2022-12-07T19:42:18.719312Z",
                "order_side": "BUY", "order_type": "Limit"
            }]
        }]),
        _ => serde_json::json!([]),
    };

    serde_json::json!({
        "channel": wire_name,
        "client_id": "",
        "timestamp": "2023-02-09T20:30:37.167359596Z",
        "sequence_num": 42,
        "events": events,
    })
    .to_string()
}
