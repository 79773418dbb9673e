/*
[INPUT]:  Control messages, routed channels, and per-message failures
[OUTPUT]: Sample-limited tracing events for stream traffic
[POS]:    WebSocket layer - traffic logging helpers
[UPDATE]: When adding log sites or changing sample limits
*/

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, error, info, warn};

use crate::error::StreamError;
use crate::types::{ChannelKind, ControlMessage};

const MESSAGE_SAMPLE_LIMIT: usize = 3;
const CONTROL_LOG_LIMIT: usize = 10;
const UNROUTED_LOG_LIMIT: usize = 3;
const FAILURE_LOG_LIMIT: usize = 3;
const PANIC_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static MESSAGE_SAMPLE_COUNT: AtomicUsize = AtomicUsize::new(0);
static CONTROL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static UNROUTED_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static FAILURE_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static PANIC_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn log_control_sent(message: &ControlMessage) {
    let count = CONTROL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= CONTROL_LOG_LIMIT {
        debug!(
            action = message.control_type().as_str(),
            channel = %message.channel(),
            "ws control message sent"
        );
        return;
    }

    info!(
        sample_index = count + 1,
        sample_limit = CONTROL_LOG_LIMIT,
        action = message.control_type().as_str(),
        channel = %message.channel(),
        products = %message.product_ids().join(","),
        "ws control message sent"
    );
}

pub(crate) fn log_message_sample_once(channel: ChannelKind, sequence: Option<u64>, bytes: usize) {
    let count = MESSAGE_SAMPLE_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= MESSAGE_SAMPLE_LIMIT {
        return;
    }

    info!(
        sample_index = count + 1,
        sample_limit = MESSAGE_SAMPLE_LIMIT,
        %channel,
        sequence = ?sequence,
        bytes,
        "ws message sample"
    );
}

pub(crate) fn log_unrouted_once(raw: &str) {
    let count = UNROUTED_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < UNROUTED_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = UNROUTED_LOG_LIMIT,
            bytes = raw.len(),
            "ws message channel unrecognized"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = UNROUTED_LOG_LIMIT,
            bytes = raw.len(),
            message = %preview,
            "ws message channel unrecognized"
        );
    }
}

pub(crate) fn log_message_failure_once(err: &StreamError, raw: Option<&str>) {
    let count = FAILURE_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= FAILURE_LOG_LIMIT {
        debug!(error = %err, "ws message dropped");
        return;
    }

    warn!(
        sample_index = count + 1,
        sample_limit = FAILURE_LOG_LIMIT,
        error = %err,
        "ws message dropped"
    );
    if let Some(raw) = raw {
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = FAILURE_LOG_LIMIT,
            bytes = raw.len(),
            message = %preview,
            "ws message dropped"
        );
    }
}

pub(crate) fn log_observer_panic_once(observer: &'static str) {
    let count = PANIC_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= PANIC_LOG_LIMIT {
        debug!(observer, "ws observer panicked");
        return;
    }

    error!(
        sample_index = count + 1,
        sample_limit = PANIC_LOG_LIMIT,
        observer,
        "ws observer panicked; remaining observers still run"
    );
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut cut = max_len;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + 3);
    out.push_str(&value[..cut]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_values() {
        assert_eq!(truncate_for_log("abc", 8), "abc");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // "é" is two bytes; cutting at 2 would split it.
        assert_eq!(truncate_for_log("aé", 2), "a...");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
    }
}
