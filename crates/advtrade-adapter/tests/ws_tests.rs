/*
[INPUT]:  A local WebSocket server and stream client scenarios
[OUTPUT]: Test results for connection lifecycle and control protocol
[POS]:    Integration tests - WebSocket
[UPDATE]: When WebSocket client changes
*/

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use advtrade_adapter::{
    ChannelKind, ConnectionState, Credentials, ReaderExit, StreamClient, StreamConfig, StreamError,
};
use common::{MockStreamServer, TEST_API_KEY, eventually, sample_message, test_config};
use tokio::net::TcpListener;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

#[test]
fn test_client_creation_starts_closed() {
    let config = StreamConfig::new(Credentials::new("key", "secret"));
    let client = assert_ok!(StreamClient::new(config));
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(!client.is_open());
}

#[test]
fn test_client_rejects_invalid_config() {
    let config = StreamConfig::new(Credentials::new("key", "secret")).with_url("http://localhost");
    assert!(matches!(StreamClient::new(config), Err(StreamError::Config(_))));
}

#[tokio::test]
async fn test_close_when_closed_is_noop() {
    let client = assert_ok!(StreamClient::new(test_config("ws://127.0.0.1:9")));
    assert_ok!(client.close().await);
    assert_ok!(client.close().await);
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_subscribe_while_closed_sends_nothing() {
    let server = MockStreamServer::start().await;
    let client = assert_ok!(StreamClient::new(test_config(&server.url)));

    assert_ok!(client.subscribe(["BTC-USD"], ChannelKind::Ticker).await);
    assert_ok!(client.unsubscribe(["BTC-USD"], ChannelKind::Ticker).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.connection_count(), 0);
    assert!(server.received().await.is_empty());
}

#[tokio::test]
async fn test_unrecognized_channel_is_argument_error() {
    let server = MockStreamServer::start().await;
    let client = assert_ok!(StreamClient::new(test_config(&server.url)));
    assert_ok!(client.open().await);

    let result = client.subscribe(["BTC-USD"], "orderbook").await;
    assert!(matches!(result, Err(StreamError::Argument(_))));

    assert_ok!(client.subscribe(["BTC-USD"], "level2").await);
    let received = server.wait_for_messages(1).await;
    assert_eq!(received.len(), 1);
    assert_ok!(client.close().await);
}

#[tokio::test]
async fn test_open_subscribe_close_round_trip() {
    let server = MockStreamServer::start().await;
    let client = assert_ok!(StreamClient::new(test_config(&server.url)));

    assert_ok!(client.open().await);
    assert_eq!(client.state(), ConnectionState::Open);
    assert_ok!(client.open().await);
    assert_eq!(server.connection_count(), 1);

    assert_ok!(client.subscribe(["BTC-USD", "ETH-USD"], ChannelKind::Level2).await);
    assert_ok!(client.subscribe(Vec::<String>::new(), ChannelKind::User).await);

    let received = server.wait_for_messages(2).await;
    assert_eq!(received.len(), 2);

    let first: serde_json::Value = serde_json::from_str(&received[0]).unwrap();
    assert_eq!(first["type"], "subscribe");
    assert_eq!(first["channel"], "level2");
    assert_eq!(first["product_ids"], serde_json::json!(["BTC-USD", "ETH-USD"]));
    assert_eq!(first["api_key"], TEST_API_KEY);
    let timestamp = first["timestamp"].as_str().unwrap();
    let expected = advtrade_adapter::sign_hex(
        common::TEST_API_SECRET.as_bytes(),
        format!("{timestamp}level2BTC-USD,ETH-USD").as_bytes(),
    )
    .unwrap();
    assert_eq!(first["signature"], expected);

    let second: serde_json::Value = serde_json::from_str(&received[1]).unwrap();
    assert_eq!(second["channel"], "user");
    assert_eq!(second["product_ids"], serde_json::json!([]));

    assert_ok!(client.close().await);
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_ok!(client.close().await);
}

#[tokio::test]
async fn test_inbound_messages_route_in_arrival_order() {
    let server = MockStreamServer::start().await;
    let client = assert_ok!(StreamClient::new(test_config(&server.url)));

    let sequence = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = sequence.clone();
    client.router().on_raw_message(move |text| {
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        sink.lock().unwrap().push(value["channel"].as_str().unwrap_or("").to_string());
    });
    let tickers = Arc::new(AtomicUsize::new(0));
    let ticker_count = tickers.clone();
    client.router().on_ticker(move |_| {
        ticker_count.fetch_add(1, Ordering::SeqCst);
    });

    assert_ok!(client.open().await);
    for wire_name in ["heartbeats", "ticker", "subscriptions", "l2_data"] {
        server.push_text(sample_message(wire_name));
    }

    assert!(eventually(|| sequence.lock().unwrap().len() == 4).await);
    assert_eq!(
        *sequence.lock().unwrap(),
        vec!["heartbeats", "ticker", "subscriptions", "l2_data"]
    );
    assert_eq!(tickers.load(Ordering::SeqCst), 1);
    assert_ok!(client.close().await);
}

#[tokio::test]
async fn test_concurrent_control_messages_never_interleave() {
    let server = MockStreamServer::start().await;
    let client = Arc::new(assert_ok!(StreamClient::new(test_config(&server.url))));
    assert_ok!(client.open().await);

    let products: Vec<String> = (0..200).map(|i| format!("COIN{i}-USD")).collect();
    let mut tasks = Vec::new();
    for task_index in 0..2 {
        let client = client.clone();
        let products = products.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                if task_index == 0 {
                    client.subscribe(products.clone(), ChannelKind::Ticker).await.unwrap();
                } else {
                    client.unsubscribe(products.clone(), ChannelKind::Ticker).await.unwrap();
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let received = server.wait_for_messages(20).await;
    assert_eq!(received.len(), 20);
    let mut subscribes = 0;
    for text in &received {
        let value: serde_json::Value = serde_json::from_str(text).expect("complete JSON message");
        assert_eq!(value["product_ids"].as_array().unwrap().len(), 200);
        if value["type"] == "subscribe" {
            subscribes += 1;
        }
    }
    assert_eq!(subscribes, 10);
    assert_ok!(client.close().await);
}

#[tokio::test]
async fn test_concurrent_opens_perform_one_handshake() {
    let server = MockStreamServer::start().await;
    let client = Arc::new(assert_ok!(StreamClient::new(test_config(&server.url))));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move { client.open().await }));
    }
    for task in tasks {
        assert_ok!(task.await.unwrap());
    }

    assert!(eventually(|| server.connection_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.connection_count(), 1);
    assert_eq!(client.reader_status().borrow().epoch, 1);
    assert_ok!(client.close().await);
}

#[tokio::test]
async fn test_peer_close_moves_state_to_closed() {
    let server = MockStreamServer::start().await;
    let client = assert_ok!(StreamClient::new(test_config(&server.url)));
    assert_ok!(client.open().await);

    server.push_close();
    let exit = tokio::time::timeout(Duration::from_secs(5), client.wait_for_reader_exit())
        .await
        .expect("reader should stop");

    assert_eq!(exit, Some(ReaderExit::PeerClosed));
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_ok!(client.close().await);

    assert_ok!(client.subscribe(["BTC-USD"], ChannelKind::Ticker).await);
    assert!(server.received().await.is_empty());
}

#[tokio::test]
async fn test_reopen_after_close_starts_new_epoch() {
    let server = MockStreamServer::start().await;
    let client = assert_ok!(StreamClient::new(test_config(&server.url)));

    assert_ok!(client.open().await);
    assert_ok!(client.close().await);
    tokio::time::timeout(Duration::from_secs(5), client.wait_for_reader_exit())
        .await
        .expect("first reader should stop");

    assert_ok!(client.open().await);
    assert_eq!(client.state(), ConnectionState::Open);
    let status = client.reader_status().borrow().clone();
    assert_eq!(status.epoch, 2);
    assert!(status.running);
    assert_ok!(client.close().await);
}

#[tokio::test]
async fn test_handshake_refused_leaves_state_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = assert_ok!(StreamClient::new(test_config(&format!("ws://127.0.0.1:{port}"))));
    let result = client.open().await;

    assert!(matches!(result, Err(StreamError::Connection { .. })));
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_handshake_timeout_leaves_state_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        // Accept TCP but never answer the upgrade request.
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let config = test_config(&format!("ws://127.0.0.1:{port}"))
        .with_handshake_timeout(Duration::from_millis(200));
    let client = assert_ok!(StreamClient::new(config));
    let result = client.open().await;

    assert!(matches!(result, Err(StreamError::Timeout { duration_ms: 200 })));
    assert_eq!(client.state(), ConnectionState::Closed);
    server.abort();
}

#[tokio::test]
async fn test_cancellation_stops_reader() {
    let server = MockStreamServer::start().await;
    let cancel = CancellationToken::new();
    let client = assert_ok!(StreamClient::with_router(
        test_config(&server.url),
        Arc::new(advtrade_adapter::MessageRouter::new()),
        cancel.clone(),
    ));
    assert_ok!(client.open().await);

    cancel.cancel();
    let exit = tokio::time::timeout(Duration::from_secs(5), client.wait_for_reader_exit())
        .await
        .expect("reader should stop");

    assert_eq!(exit, Some(ReaderExit::Cancelled));
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(matches!(client.open().await, Err(StreamError::Cancelled)));
}

#[tokio::test]
async fn test_abandoned_open_leaves_state_closed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        // Accept TCP but never answer the upgrade request.
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = assert_ok!(StreamClient::new(test_config(&format!(
        "ws://127.0.0.1:{port}"
    ))));
    let abandoned = tokio::time::timeout(Duration::from_millis(100), client.open()).await;

    assert!(abandoned.is_err());
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_ok!(client.close().await);
    server.abort();
}

#[tokio::test]
async fn test_oversized_message_stops_reader_and_closes() {
    let server = MockStreamServer::start().await;
    let client = assert_ok!(StreamClient::new(
        test_config(&server.url).with_max_message_bytes(1024)
    ));
    assert_ok!(client.open().await);

    server.push_text("x".repeat(4096));
    let exit = tokio::time::timeout(Duration::from_secs(5), client.wait_for_reader_exit())
        .await
        .expect("reader should stop");

    assert!(matches!(exit, Some(ReaderExit::Transport(_))));
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_decode_failure_reaches_error_observer_without_typed_observer() {
    let server = MockStreamServer::start().await;
    let client = assert_ok!(StreamClient::new(test_config(&server.url)));
    let errors = Arc::new(AtomicUsize::new(0));
    let errors_seen = errors.clone();
    client.router().on_error(move |err| {
        assert!(
            matches!(err, StreamError::Decode { channel, .. } if *channel == ChannelKind::Ticker)
        );
        errors_seen.fetch_add(1, Ordering::SeqCst);
    });
    assert_ok!(client.open().await);

    server.push_text(r#"{"channel":"ticker","sequence_num":1,"events":[{"type":"bogus"}]}"#);
    assert!(eventually(|| errors.load(Ordering::SeqCst) == 1).await);
    assert!(client.is_open());
    assert_ok!(client.close().await);
}
