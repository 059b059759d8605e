//! tracer-core: the trace correlation engine.
//!
//! This crate holds everything between the raw feeds and the observers:
//! the block parser, the correlation store, the exclusion filter, the
//! broadcast hub, and the [`Engine`] that ties them together.
//!
//! # Architecture
//!
//! ```text
//! file tail ──► TracePipeline ──► Filter ──► CorrelationStore ──┐
//!                                                               ├──► BroadcastHub ──► observers
//! logcat    ──► Engine::append_lines ──► LineBuffer ────────────┘
//! ```
//!
//! Feeds run on background tasks; the HTTP surface only talks to [`Engine`].

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hub;
pub mod lines;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod store;
pub mod types;

pub use engine::{Engine, Snapshot};
pub use error::{DropReason, TraceError};
pub use hub::{BroadcastHub, EventKind, HubEvent, Subscription};
pub use pipeline::TracePipeline;
pub use types::{BlockKind, LogLevel, ParsedResponse, PendingRequest, RawTransaction, Transaction};
