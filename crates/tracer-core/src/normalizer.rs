//! Normalizer: turns a [`RawTransaction`] into an observer-ready [`Transaction`].
//!
//! Every rule here is infallible: missing fields get defaults, a bad status
//! becomes `None`, and a body that does not decode as JSON simply carries no
//! parsed form.

use crate::types::{RawTransaction, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};

/// Display format for capture timestamps (`MM-DD HH:MM:SS.mmm`).
pub const TIMESTAMP_FORMAT: &str = "%m-%d %H:%M:%S%.3f";

/// Fill defaults, coerce the status and decode JSON bodies.
pub fn normalize(raw: RawTransaction) -> Transaction {
    let request_body = raw.request_body.unwrap_or_default();
    let response_body = raw.response_body.unwrap_or_default();

    Transaction {
        id: raw.id.unwrap_or_else(next_id),
        timestamp: raw.timestamp.unwrap_or_else(format_timestamp_now),
        method: raw
            .method
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "UNKNOWN".to_string()),
        url: raw.url.unwrap_or_default(),
        request_headers: raw.request_headers,
        request_body_parsed: try_parse_json(&request_body),
        request_body,
        response_status: raw.response_status.as_deref().and_then(coerce_status),
        response_time_ms: raw.response_time_ms.unwrap_or(0),
        response_headers: raw.response_headers,
        response_body_parsed: try_parse_json(&response_body),
        response_body,
    }
}

/// The current local time in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Decode `raw` as JSON if, once trimmed, it looks like an object or array.
///
/// Returns `None` for anything else, including text that starts like JSON
/// but fails to decode.
pub fn try_parse_json(raw: &str) -> Option<serde_json::Value> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn coerce_status(raw: &str) -> Option<u16> {
    raw.trim().parse().ok()
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A unique id derived from the current time in milliseconds plus a
/// rolling three-digit counter.
///
/// Stays below 2^53 so browsers decode it without loss.
pub fn next_id() -> u64 {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let jitter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) % 1_000;
    millis * 1_000 + jitter
}
