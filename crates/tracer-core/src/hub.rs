//! Broadcast hub: fan-out of engine events to live observers.
//!
//! Each observer gets a bounded channel. [`BroadcastHub::publish`] serialises
//! the payload once and `try_send`s it to every registered observer; an
//! observer whose channel is full or closed is unregistered on the spot, so
//! a stalled connection can never hold up the pipeline.
//!
//! ```text
//! publish ──► [queue S1] ──► Subscription ──► SSE connection 1
//!        ├──► [queue S2] ──► Subscription ──► SSE connection 2
//!        └──► ...
//! ```

use futures::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

/// Per-observer queue depth before the observer is considered stalled.
pub const SUBSCRIBER_BUFFER: usize = 1024;

/// Interval for transport-level keep-alives on idle connections.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Names of the events pushed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Snapshot of history, exclusions and trace lines. Always first.
    Init,
    /// One new transaction.
    NewLog,
    /// Newly appended trace lines.
    LogcatUpdate,
    LogcatCleared,
    LogsCleared,
    ExcludedPatternsUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::NewLog => "newLog",
            EventKind::LogcatUpdate => "logcatUpdate",
            EventKind::LogcatCleared => "logcatCleared",
            EventKind::LogsCleared => "logsCleared",
            EventKind::ExcludedPatternsUpdated => "excludedPatternsUpdated",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event with its payload already encoded as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEvent {
    pub kind: EventKind,
    pub data: Arc<str>,
}

impl HubEvent {
    pub fn new<T: Serialize + ?Sized>(kind: EventKind, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            kind,
            data: serde_json::to_string(payload)?.into(),
        })
    }

    /// Decode the payload, mostly useful in tests.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.data).unwrap_or(serde_json::Value::Null)
    }
}

static SUBSCRIBER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct Subscriber {
    id: u64,
    sender: mpsc::Sender<HubEvent>,
}

#[derive(Debug, Default)]
struct Registry {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Registry {
    fn remove(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }
}

/// Registry of live observers.
#[derive(Debug, Clone, Default)]
pub struct BroadcastHub {
    registry: Arc<Registry>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer whose first event is `init`.
    ///
    /// The caller is responsible for building `init` under the same locks
    /// that guard the state it describes, so no event can fall between the
    /// snapshot and registration.
    pub fn subscribe(&self, init: HubEvent) -> Subscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = SUBSCRIBER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        // Fresh channel with capacity > 0, so this cannot fail.
        let _ = sender.try_send(init);
        self.registry
            .subscribers
            .lock()
            .push(Subscriber { id, sender });
        tracing::debug!(subscriber = id, "observer connected");

        Subscription {
            id,
            receiver,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Unregister by id. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: u64) {
        if self.registry.remove(id) {
            tracing::debug!(subscriber = id, "observer disconnected");
        }
    }

    /// Encode `payload` and deliver it to every observer.
    ///
    /// Never fails: encoding errors are logged, and observers that cannot
    /// accept the event are dropped. Returns the number of observers that
    /// received it.
    pub fn publish<T: Serialize + ?Sized>(&self, kind: EventKind, payload: &T) -> usize {
        match HubEvent::new(kind, payload) {
            Ok(event) => self.publish_event(event),
            Err(err) => {
                tracing::error!(event = %kind, error = %err, "failed to encode event payload");
                0
            }
        }
    }

    pub fn publish_event(&self, event: HubEvent) -> usize {
        let mut subscribers = self.registry.subscribers.lock();
        let mut delivered = 0;
        subscribers.retain(|subscriber| match subscriber.sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    subscriber = subscriber.id,
                    event = %event.kind,
                    "observer queue full; dropping observer"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = subscriber.id, "observer gone; unregistering");
                false
            }
        });
        delivered
    }

    /// Number of registered observers.
    pub fn count(&self) -> usize {
        self.registry.subscribers.lock().len()
    }
}

/// A live observer's end of the hub. Unregisters itself on drop.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<HubEvent>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.receiver.recv().await
    }

    /// Take an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = HubEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registry.remove(self.id) {
            tracing::debug!(subscriber = self.id, "observer disconnected");
        }
    }
}
