//! Domain-specific assertion macros and async wait helpers for tracer
//! harnesses.
//!
//! These wrap `pretty_assertions` and add context-rich failure messages that
//! make it clear *what* correlation invariant was violated.

use std::time::Duration;
use tracer_core::{EventKind, HubEvent, Subscription, Transaction};

// ---------------------------------------------------------------------------
// Transaction assertions
// ---------------------------------------------------------------------------

/// Assert the method, URL and status of a transaction.
///
/// ```rust
/// assert_transaction!(tx, "GET", "http://api.test/x", Some(200));
/// ```
#[macro_export]
macro_rules! assert_transaction {
    ($tx:expr, $method:expr, $url:expr, $status:expr) => {{
        let tx: &tracer_core::Transaction = &$tx;
        let expected: (&str, &str, Option<u16>) = ($method, $url, $status);
        let actual = (tx.method.as_str(), tx.url.as_str(), tx.response_status);
        if actual != expected {
            panic!(
                "assert_transaction! failed:\n  expected: {:?}\n  actual:   {:?}\n  tx: {:#?}",
                expected, actual, tx
            );
        }
    }};
}

/// Assert that history holds exactly these URLs, newest first.
#[macro_export]
macro_rules! assert_history_urls {
    ($engine:expr, [$($url:expr),* $(,)?]) => {{
        let history: Vec<String> = $engine.transactions().into_iter().map(|tx| tx.url).collect();
        let expected: Vec<String> = vec![$($url.to_string()),*];
        pretty_assertions::assert_eq!(history, expected, "history URLs (newest first)");
    }};
}

/// URLs of a transaction list, in order.
pub fn urls(transactions: &[Transaction]) -> Vec<&str> {
    transactions.iter().map(|tx| tx.url.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Async helpers
// ---------------------------------------------------------------------------

/// Poll `check` every 10ms until it returns true or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Next hub event, panicking if none arrives within a second.
pub async fn next_event(sub: &mut Subscription) -> HubEvent {
    match tokio::time::timeout(Duration::from_secs(1), sub.recv()).await {
        Ok(Some(event)) => event,
        Ok(None) => panic!("subscription closed while waiting for an event"),
        Err(_) => panic!("no hub event within 1s"),
    }
}

/// Skip events until one of `kind` arrives.
pub async fn next_event_of(sub: &mut Subscription, kind: EventKind) -> HubEvent {
    loop {
        let event = next_event(sub).await;
        if event.kind == kind {
            return event;
        }
    }
}

/// Drain everything already queued, without waiting.
pub fn drain(sub: &mut Subscription) -> Vec<HubEvent> {
    std::iter::from_fn(|| sub.try_recv()).collect()
}
