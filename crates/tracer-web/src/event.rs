//! Hub events as server-sent events.
//!
//! Each observer connection owns one [`Subscription`]; its first event is
//! always `init`. When the client goes away axum drops the stream, the
//! subscription drops with it and unregisters from the hub.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tracer_core::{HubEvent, Subscription};

/// Map a hub event to its wire form: `event: <name>` / `data: <json>`.
pub fn to_sse(event: &HubEvent) -> Event {
    Event::default().event(event.kind.as_str()).data(&*event.data)
}

/// The SSE response for one observer.
pub fn event_stream(
    subscription: Subscription,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let connected = stream::once(async { Ok::<_, Infallible>(Event::default().comment("connected")) });
    let events = subscription.map(|event| Ok(to_sse(&event)));

    Sse::new(connected.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(keep_alive)
            .text("keepalive"),
    )
}
