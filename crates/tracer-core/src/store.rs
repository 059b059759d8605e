//! Store: per-URL pending-request queues and the bounded transaction history.
//!
//! The store is the single source of truth for transactions; observers read
//! snapshots of it, never the feed directly. Requests wait in a FIFO queue
//! keyed by their exact URL so that concurrent calls to the same endpoint
//! are matched in issue order.

use crate::normalizer::normalize;
use crate::types::{ParsedResponse, PendingRequest, RawTransaction, Transaction};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Maximum number of transactions retained in history.
pub const HISTORY_CAPACITY: usize = 100;

/// Pending queues plus newest-first history.
#[derive(Debug)]
pub struct CorrelationStore {
    pending: HashMap<String, VecDeque<PendingRequest>>,
    history: VecDeque<Transaction>,
    capacity: usize,
    /// Pending requests older than this are evicted. `None` keeps them forever.
    pending_ttl: Option<Duration>,
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CorrelationStore {
    pub fn new(pending_ttl: Option<Duration>) -> Self {
        Self::with_capacity(HISTORY_CAPACITY, pending_ttl)
    }

    pub fn with_capacity(capacity: usize, pending_ttl: Option<Duration>) -> Self {
        Self {
            pending: HashMap::new(),
            history: VecDeque::with_capacity(capacity + 1),
            capacity,
            pending_ttl,
        }
    }

    // -----------------------------------------------------------------------
    // Pending queues
    // -----------------------------------------------------------------------

    /// Queue a request behind any earlier unmatched requests for its URL.
    pub fn enqueue(&mut self, request: PendingRequest) {
        self.expire_pending(request.captured_at);
        self.pending
            .entry(request.url.clone())
            .or_default()
            .push_back(request);
    }

    /// Pop the oldest pending request for exactly `url`.
    pub fn take_pending(&mut self, url: &str) -> Option<PendingRequest> {
        self.expire_pending(Instant::now());
        let queue = self.pending.get_mut(url)?;
        let request = queue.pop_front();
        if queue.is_empty() {
            self.pending.remove(url);
        }
        request
    }

    /// Match a response against the oldest pending request for its URL,
    /// then normalise and record the pair.
    ///
    /// Returns `None` (and changes nothing) when no request is pending.
    pub fn complete(&mut self, response: ParsedResponse) -> Option<Transaction> {
        let request = self.take_pending(&response.url)?;
        Some(self.submit(RawTransaction::from_pair(request, response)))
    }

    /// Evict pending requests captured more than the TTL before `now`.
    ///
    /// Returns the URLs of evicted requests, oldest first per URL.
    pub fn expire_pending(&mut self, now: Instant) -> Vec<String> {
        let Some(ttl) = self.pending_ttl else {
            return Vec::new();
        };

        let mut evicted = Vec::new();
        self.pending.retain(|url, queue| {
            while queue
                .front()
                .is_some_and(|req| now.saturating_duration_since(req.captured_at) > ttl)
            {
                queue.pop_front();
                evicted.push(url.clone());
            }
            !queue.is_empty()
        });

        for url in &evicted {
            tracing::warn!(url = %url, "pending request expired without a response");
        }
        evicted
    }

    /// Number of requests still waiting for a response, across all URLs.
    pub fn pending_len(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }

    pub fn pending_for(&self, url: &str) -> usize {
        self.pending.get(url).map_or(0, VecDeque::len)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Normalise `raw` and prepend it to history, evicting the oldest
    /// entries past capacity.
    pub fn submit(&mut self, raw: RawTransaction) -> Transaction {
        let tx = normalize(raw);
        self.history.push_front(tx.clone());
        self.history.truncate(self.capacity);
        tx
    }

    /// History, newest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Drop all history. Pending requests are kept. Returns how many
    /// transactions were removed.
    pub fn clear_history(&mut self) -> usize {
        let removed = self.history.len();
        self.history.clear();
        removed
    }
}
