/*
[INPUT]:  Channel event schemas published on the stream
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - per-channel event payloads
[UPDATE]: When channel schemas change or new channels are added
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{BookSide, EventType, OrderSide};

// ---- candles ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlesEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub candles: Vec<Candle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start, unix seconds
    #[serde(deserialize_with = "serde_helpers::deserialize_i64_lenient")]
    pub start: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    pub product_id: String,
}

// ---- heartbeats ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    pub current_time: String,
    #[serde(deserialize_with = "serde_helpers::deserialize_i64_lenient")]
    pub heartbeat_counter: i64,
}

// ---- market_trades ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTradesEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub trades: Vec<MarketTrade>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTrade {
    pub trade_id: String,
    pub product_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
    pub side: OrderSide,
    pub time: DateTime<Utc>,
}

// ---- status ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub products: Vec<ProductStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStatus {
    pub product_type: String,
    pub id: String,
    pub base_currency: String,
    pub quote_currency: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub base_increment: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub quote_increment: Decimal,
    pub display_name: String,
    pub status: String,
    #[serde(default)]
    pub status_message: String,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub min_market_funds: Decimal,
}

// ---- ticker / ticker_batch ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub tickers: Vec<Ticker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    #[serde(rename = "type", default)]
    pub ticker_type: String,
    pub product_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub volume_24_h: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub low_24_h: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub high_24_h: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub low_52_w: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub high_52_w: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub price_percent_chg_24_h: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub best_bid: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub best_bid_quantity: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub best_ask: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub best_ask_quantity: Option<Decimal>,
}

// ---- level2 ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level2Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub product_id: String,
    #[serde(default)]
    pub updates: Vec<Level2Update>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level2Update {
    pub side: BookSide,
    pub event_time: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_level: Decimal,
    /// Zero removes the level
    #[serde(with = "rust_decimal::serde::str")]
    pub new_quantity: Decimal,
}

// ---- user ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub orders: Vec<UserOrder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserOrder {
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: String,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub cumulative_quantity: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub leaves_quantity: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub avg_price: Decimal,
    #[serde(
        default,
        deserialize_with = "serde_helpers::deserialize_decimal_or_zero",
        serialize_with = "serde_helpers::serialize_decimal"
    )]
    pub total_fees: Decimal,
    pub status: String,
    pub product_id: String,
    pub creation_time: DateTime<Utc>,
    pub order_side: OrderSide,
    pub order_type: String,
}

mod serde_helpers {
    use super::Decimal;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use std::str::FromStr;

    pub fn deserialize_decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Decimal::ZERO);
        }

        if let Some(raw) = value.as_str() {
            if raw.trim().is_empty() {
                return Ok(Decimal::ZERO);
            }
            return Decimal::from_str(raw).map_err(serde::de::Error::custom);
        }

        if value.is_number() {
            return Decimal::from_str(&value.to_string()).map_err(serde::de::Error::custom);
        }

        Err(serde::de::Error::custom("invalid decimal value"))
    }

    pub fn serialize_decimal<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    /// Integers the exchange sends either as JSON numbers or as strings
    pub fn deserialize_i64_lenient<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(number) => number
                .as_i64()
                .ok_or_else(|| serde::de::Error::custom("integer out of range")),
            Value::String(raw) => raw.trim().parse().map_err(serde::de::Error::custom),
            _ => Err(serde::de::Error::custom("invalid integer value")),
        }
    }
}
