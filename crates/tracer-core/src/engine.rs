//! Engine: the shared state behind every pipeline and observer.
//!
//! One [`Engine`] owns the correlation store, the trace-line ring buffer,
//! the exclusion filter and the broadcast hub. Feeds push into it, the HTTP
//! surface mutates and snapshots it, and every state change is published
//! through the hub.
//!
//! Lock order is store → lines → filter → hub registry. Publishing a change
//! happens while the lock guarding that state is held, and
//! [`Engine::subscribe`] takes every lock before registering, so a new
//! observer sees each event either in its `init` snapshot or live, never
//! both and never neither.

use crate::config::Config;
use crate::error::{DropReason, Result};
use crate::filter::ExclusionFilter;
use crate::hub::{BroadcastHub, EventKind, HubEvent, Subscription};
use crate::lines::LineBuffer;
use crate::store::CorrelationStore;
use crate::types::{BlockKind, ParsedResponse, PendingRequest, RawTransaction, Transaction};
use parking_lot::Mutex;
use serde::Serialize;

/// Payload of the `init` event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub transactions: Vec<Transaction>,
    pub excluded_patterns: Vec<String>,
    pub logcat: Vec<String>,
}

#[derive(Serialize)]
struct LinesPayload<'a> {
    lines: &'a [String],
}

#[derive(Debug)]
pub struct Engine {
    store: Mutex<CorrelationStore>,
    lines: Mutex<LineBuffer>,
    filter: ExclusionFilter,
    hub: BroadcastHub,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        let filter = ExclusionFilter::with_patterns(&config.filter.exclude);
        if !filter.is_empty() {
            tracing::info!(patterns = ?filter.patterns(), "filtering out API calls matching patterns");
        }
        Self {
            store: Mutex::new(CorrelationStore::new(config.trace.pending_ttl())),
            lines: Mutex::new(LineBuffer::new(config.logcat.max_lines)),
            filter,
            hub: BroadcastHub::new(),
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    /// Register an observer and queue its `init` snapshot.
    pub fn subscribe(&self) -> Subscription {
        let store = self.store.lock();
        let lines = self.lines.lock();
        let snapshot = Snapshot {
            transactions: store.transactions(),
            excluded_patterns: self.filter.patterns(),
            logcat: lines.snapshot(),
        };
        let init = match HubEvent::new(EventKind::Init, &snapshot) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(error = %err, "failed to encode init snapshot");
                HubEvent {
                    kind: EventKind::Init,
                    data: "null".into(),
                }
            }
        };
        self.hub.subscribe(init)
    }

    pub fn snapshot(&self) -> Snapshot {
        let store = self.store.lock();
        let lines = self.lines.lock();
        Snapshot {
            transactions: store.transactions(),
            excluded_patterns: self.filter.patterns(),
            logcat: lines.snapshot(),
        }
    }

    // -----------------------------------------------------------------------
    // Correlation
    // -----------------------------------------------------------------------

    /// Queue a parsed request unless its URL is excluded.
    pub fn record_request(&self, request: PendingRequest) -> std::result::Result<(), DropReason> {
        if self.filter.test(&request.url) {
            return Err(DropReason::Excluded {
                kind: BlockKind::Request,
                url: request.url,
            });
        }
        self.store.lock().enqueue(request);
        Ok(())
    }

    /// Match a parsed response with its pending request and publish the
    /// resulting transaction.
    ///
    /// A response whose URL became excluded after its request was queued
    /// still consumes that request but produces nothing.
    pub fn record_response(
        &self,
        response: ParsedResponse,
    ) -> std::result::Result<Transaction, DropReason> {
        let mut store = self.store.lock();
        if self.filter.test(&response.url) {
            store.take_pending(&response.url);
            return Err(DropReason::Excluded {
                kind: BlockKind::Response,
                url: response.url,
            });
        }
        let url = response.url.clone();
        let tx = store
            .complete(response)
            .ok_or(DropReason::UnmatchedResponse { url })?;
        self.hub.publish(EventKind::NewLog, &tx);
        Ok(tx)
    }

    /// Normalise and record an already-matched transaction.
    pub fn submit(&self, raw: RawTransaction) -> Transaction {
        let mut store = self.store.lock();
        let tx = store.submit(raw);
        self.hub.publish(EventKind::NewLog, &tx);
        tx
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.store.lock().transactions()
    }

    pub fn pending_len(&self) -> usize {
        self.store.lock().pending_len()
    }

    /// Drop all history and tell observers. Returns the number removed.
    pub fn clear_history(&self) -> usize {
        let mut store = self.store.lock();
        let removed = store.clear_history();
        self.hub.publish(EventKind::LogsCleared, &());
        removed
    }

    // -----------------------------------------------------------------------
    // Trace lines
    // -----------------------------------------------------------------------

    /// Append non-empty lines to the ring buffer and publish them as an
    /// incremental update.
    pub fn append_lines(&self, lines: Vec<String>) {
        let lines: Vec<String> = lines
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect();
        if lines.is_empty() {
            return;
        }
        let mut buffer = self.lines.lock();
        self.hub
            .publish(EventKind::LogcatUpdate, &LinesPayload { lines: &lines });
        buffer.extend(lines);
    }

    pub fn clear_lines(&self) {
        let mut buffer = self.lines.lock();
        buffer.clear();
        self.hub.publish(EventKind::LogcatCleared, &());
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().snapshot()
    }

    pub fn max_lines(&self) -> usize {
        self.lines.lock().capacity()
    }

    // -----------------------------------------------------------------------
    // Exclusions
    // -----------------------------------------------------------------------

    /// Add an exclusion pattern; broadcasts the full list when it changes.
    pub fn add_exclusion(&self, pattern: &str) -> Result<bool> {
        let changed = self.filter.add(pattern)?;
        if changed {
            tracing::info!(pattern = pattern.trim(), "added exclusion pattern");
            self.publish_patterns();
        }
        Ok(changed)
    }

    /// Remove an exclusion pattern; broadcasts the full list when it changes.
    pub fn remove_exclusion(&self, pattern: &str) -> Result<bool> {
        let changed = self.filter.remove(pattern)?;
        if changed {
            tracing::info!(pattern = pattern.trim(), "removed exclusion pattern");
            self.publish_patterns();
        }
        Ok(changed)
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.filter.test(url)
    }

    pub fn exclusions(&self) -> Vec<String> {
        self.filter.patterns()
    }

    fn publish_patterns(&self) {
        self.hub
            .publish(EventKind::ExcludedPatternsUpdated, &self.filter.patterns());
    }
}
