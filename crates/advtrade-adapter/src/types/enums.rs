/*
[INPUT]:  Stream protocol vocabulary and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for stream communication
[UPDATE]: When the exchange adds channels or enumerated payload values
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

/// Logical stream categories offered by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Candles,
    Heartbeats,
    MarketTrades,
    Status,
    Ticker,
    TickerBatch,
    #[serde(alias = "l2_data")]
    Level2,
    User,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 8] = [
        ChannelKind::Candles,
        ChannelKind::Heartbeats,
        ChannelKind::MarketTrades,
        ChannelKind::Status,
        ChannelKind::Ticker,
        ChannelKind::TickerBatch,
        ChannelKind::Level2,
        ChannelKind::User,
    ];

    /// Name used in subscribe requests and inbound discriminators
    pub const fn wire_name(self) -> &'static str {
        match self {
            ChannelKind::Candles => "candles",
            ChannelKind::Heartbeats => "heartbeats",
            ChannelKind::MarketTrades => "market_trades",
            ChannelKind::Status => "status",
            ChannelKind::Ticker => "ticker",
            ChannelKind::TickerBatch => "ticker_batch",
            ChannelKind::Level2 => "level2",
            ChannelKind::User => "user",
        }
    }

    /// Resolve an inbound discriminator.
    ///
    /// Order book updates arrive as `l2_data` although the subscription uses `level2`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "l2_data" => Some(ChannelKind::Level2),
            _ => ChannelKind::ALL
                .into_iter()
                .find(|kind| kind.wire_name() == name),
        }
    }

    /// Channels scoped to the authenticated account rather than to products
    pub const fn is_account_scoped(self) -> bool {
        matches!(self, ChannelKind::User | ChannelKind::Heartbeats)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ChannelKind {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelKind::from_wire(s)
            .ok_or_else(|| StreamError::argument(format!("unrecognized channel: {s:?}")))
    }
}

/// Anything a subscribe call can resolve to a [`ChannelKind`]
pub trait IntoChannel {
    fn into_channel(self) -> Result<ChannelKind, StreamError>;
}

impl IntoChannel for ChannelKind {
    fn into_channel(self) -> Result<ChannelKind, StreamError> {
        Ok(self)
    }
}

impl IntoChannel for &str {
    fn into_channel(self) -> Result<ChannelKind, StreamError> {
        self.parse()
    }
}

impl IntoChannel for String {
    fn into_channel(self) -> Result<ChannelKind, StreamError> {
        self.parse()
    }
}

/// Socket lifecycle as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Closed = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
}

impl ConnectionState {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Closed => "closed",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    Subscribe,
    Unsubscribe,
}

impl ControlType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ControlType::Subscribe => "subscribe",
            ControlType::Unsubscribe => "unsubscribe",
        }
    }
}

/// Whether an event carries a full snapshot or an incremental update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Snapshot,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Side of an order book level; asks are published as `offer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    #[serde(alias = "ask")]
    Offer,
}
