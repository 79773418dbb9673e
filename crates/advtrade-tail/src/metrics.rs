/*
[INPUT]:  Routed stream messages and per-message failures
[OUTPUT]: Snapshot-friendly counters for the shutdown summary
[POS]:    Shared runtime metrics between stream observers and the runner
[UPDATE]: When adding/removing tail-level runtime signals
*/

use std::collections::BTreeMap;
use std::time::Instant;

use advtrade_adapter::ChannelKind;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TailMetricsSnapshot {
    pub messages: u64,
    pub errors: u64,
    pub per_channel: BTreeMap<String, u64>,
    pub last_sequence: Option<u64>,
    pub last_heartbeat_counter: Option<i64>,
    pub last_update: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct TailMetrics {
    messages: u64,
    errors: u64,
    per_channel: BTreeMap<String, u64>,
    last_sequence: Option<u64>,
    last_heartbeat_counter: Option<i64>,
    last_update: Option<Instant>,
}

impl TailMetrics {
    pub fn snapshot(&self) -> TailMetricsSnapshot {
        TailMetricsSnapshot {
            messages: self.messages,
            errors: self.errors,
            per_channel: self.per_channel.clone(),
            last_sequence: self.last_sequence,
            last_heartbeat_counter: self.last_heartbeat_counter,
            last_update: self.last_update,
        }
    }

    pub fn record_raw(&mut self) {
        self.messages += 1;
        self.last_update = Some(Instant::now());
    }

    pub fn record_typed(&mut self, channel: ChannelKind, sequence: u64) {
        *self
            .per_channel
            .entry(channel.wire_name().to_string())
            .or_default() += 1;
        self.last_sequence = Some(sequence);
        self.last_update = Some(Instant::now());
    }

    pub fn record_heartbeat(&mut self, counter: i64) {
        self.last_heartbeat_counter = Some(counter);
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
        self.last_update = Some(Instant::now());
    }
}
