//! Trace pipeline: block parser wired to the engine.
//!
//! ```text
//! lines ──► BlockParser ──► Request  ──► Engine::record_request  (filter, enqueue)
//!                      ├──► Response ──► Engine::record_response (match, publish)
//!                      └──► Malformed ─► dropped
//! ```
//!
//! A pipeline is driven by exactly one feed task, so its parser state needs
//! no locking.

use crate::engine::Engine;
use crate::error::DropReason;
use crate::lines::LineSplitter;
use crate::parser::{BlockEvent, BlockParser};
use crate::types::Transaction;
use std::sync::Arc;

pub struct TracePipeline {
    parser: BlockParser,
    splitter: LineSplitter,
    engine: Arc<Engine>,
}

impl TracePipeline {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            parser: BlockParser::new(),
            splitter: LineSplitter::new(),
            engine,
        }
    }

    /// Feed one line; returns the transaction it completed, if any.
    pub fn feed_line(&mut self, line: &str) -> Option<Transaction> {
        let event = self.parser.feed_line(line)?;
        match self.handle(event) {
            Ok(tx) => tx,
            Err(reason) => {
                log_drop(&reason);
                None
            }
        }
    }

    /// Feed a raw byte chunk; partial trailing lines are held until the
    /// next chunk completes them.
    pub fn feed_chunk(&mut self, chunk: &[u8]) -> Vec<Transaction> {
        let lines = self.splitter.push(chunk);
        lines.iter().filter_map(|line| self.feed_line(line)).collect()
    }

    /// Feed a block of complete text (e.g. a file backfill).
    pub fn feed_text(&mut self, text: &str) -> Vec<Transaction> {
        text.lines().filter_map(|line| self.feed_line(line)).collect()
    }

    /// Forget partial lines and any half-collected block, e.g. after the
    /// underlying file was truncated.
    pub fn reset(&mut self) {
        self.splitter.reset();
        self.parser.reset();
    }

    fn handle(&mut self, event: BlockEvent) -> Result<Option<Transaction>, DropReason> {
        match event {
            BlockEvent::Request(request) => {
                tracing::debug!(url = %request.url, method = %request.method, "request captured");
                self.engine.record_request(request)?;
                Ok(None)
            }
            BlockEvent::Response(response) => {
                let tx = self.engine.record_response(response)?;
                tracing::debug!(url = %tx.url, status = ?tx.response_status, "transaction recorded");
                Ok(Some(tx))
            }
            BlockEvent::Malformed(kind) => Err(DropReason::MalformedBlock { kind }),
        }
    }
}

fn log_drop(reason: &DropReason) {
    match reason {
        DropReason::MalformedBlock { kind } => {
            tracing::debug!(kind = %kind, "dropping malformed block");
        }
        DropReason::UnmatchedResponse { url } => {
            tracing::warn!(url = %url, kind = "response", "dropping response with no pending request");
        }
        DropReason::Excluded { kind, url } => {
            tracing::debug!(url = %url, kind = %kind, "dropping excluded traffic");
        }
    }
}
