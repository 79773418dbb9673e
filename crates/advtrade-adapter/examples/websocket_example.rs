/*
[INPUT]:  ADVTRADE_API_KEY / ADVTRADE_API_SECRET environment variables
[OUTPUT]: Ticker and heartbeat updates printed for a few seconds
[POS]:    Examples - stream client usage
[UPDATE]: When the StreamClient API changes
*/

use advtrade_adapter::*;
use tokio::time::{Duration, sleep};

/// Example: subscribe to BTC-USD ticker updates and heartbeats
#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Advanced Trade Stream Example ===\n");

    let credentials = Credentials::new(
        std::env::var("ADVTRADE_API_KEY").unwrap_or_default(),
        std::env::var("ADVTRADE_API_SECRET").unwrap_or_default(),
    );
    let client = StreamClient::new(StreamConfig::new(credentials))?;

    client.router().on_ticker(|message| {
        for ticker in message.events.iter().flat_map(|event| &event.tickers) {
            println!("ticker {} {}", ticker.product_id, ticker.price);
        }
    });
    client.router().on_heartbeats(|message| {
        println!("heartbeat seq={}", message.sequence_num);
    });
    client.router().on_error(|err| eprintln!("dropped message: {err}"));

    client.open().await?;
    client.subscribe(["BTC-USD"], ChannelKind::Ticker).await?;
    client.subscribe(Vec::<String>::new(), "heartbeats").await?;

    sleep(Duration::from_secs(5)).await;

    client.unsubscribe(["BTC-USD"], ChannelKind::Ticker).await?;
    client.close().await?;
    println!("\n✓ Stream example complete");
    Ok(())
}
