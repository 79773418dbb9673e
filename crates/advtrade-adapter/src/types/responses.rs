/*
[INPUT]:  Inbound stream messages
[OUTPUT]: Typed envelopes shared by every channel
[POS]:    Data layer - inbound message framing fields
[UPDATE]: When the inbound envelope gains or loses top-level fields
*/

use serde::{Deserialize, Serialize};

use super::models::{
    CandlesEvent, HeartbeatEvent, Level2Event, MarketTradesEvent, StatusEvent, TickerEvent,
    UserEvent,
};

/// Top-level shape of every inbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEnvelope<E> {
    pub channel: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub sequence_num: u64,
    #[serde(default = "Vec::new")]
    pub events: Vec<E>,
}

pub type CandlesMessage = StreamEnvelope<CandlesEvent>;
pub type HeartbeatsMessage = StreamEnvelope<HeartbeatEvent>;
pub type MarketTradesMessage = StreamEnvelope<MarketTradesEvent>;
pub type StatusMessage = StreamEnvelope<StatusEvent>;
pub type TickerMessage = StreamEnvelope<TickerEvent>;
pub type TickerBatchMessage = StreamEnvelope<TickerEvent>;
pub type Level2Message = StreamEnvelope<Level2Event>;
pub type UserMessage = StreamEnvelope<UserEvent>;
