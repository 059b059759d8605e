//! Streaming block parser for delimited request/response trace text.
//!
//! The trace file is a sequence of sections:
//!
//! ```text
//! ===== REQUEST =====
//! GET http://api.test/x
//! Authorization: Bearer t
//! ========================
//! ===== RESPONSE =====
//! 200 OK URL: http://api.test/x
//! Content-Type: application/json
//!
//! Body: {"ok":true}
//! ========================
//! ```
//!
//! [`BlockParser::feed_line`] is called once per line and yields a
//! [`BlockEvent`] whenever a block closes. The parser has no knowledge of
//! pending requests or exclusions; that is the pipeline's job.

use crate::normalizer::format_timestamp_now;
use crate::types::{BlockKind, Headers, ParsedResponse, PendingRequest};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Instant;

pub const REQUEST_OPEN: &str = "===== REQUEST =====";
pub const RESPONSE_OPEN: &str = "===== RESPONSE =====";
pub const BLOCK_CLOSE: &str = "========================";

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{3})\s+(?:.*?\s+)?URL:\s*(.+)$").expect("status line regex is valid")
});

/// Outcome of a closed block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockEvent {
    Request(PendingRequest),
    Response(ParsedResponse),
    /// The block closed but its first line was unusable.
    Malformed(BlockKind),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    InBlock(BlockKind),
}

/// Incremental state machine over trace lines.
#[derive(Debug, Default)]
pub struct BlockParser {
    state: State,
    lines: Vec<String>,
}

impl BlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// The kind of block currently being collected, if any.
    pub fn current_block(&self) -> Option<BlockKind> {
        match self.state {
            State::Idle => None,
            State::InBlock(kind) => Some(kind),
        }
    }

    /// Feed one line (without its terminator).
    pub fn feed_line(&mut self, line: &str) -> Option<BlockEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let trimmed = line.trim();

        if trimmed.contains(REQUEST_OPEN) {
            self.open(BlockKind::Request);
            return None;
        }
        if trimmed.contains(RESPONSE_OPEN) {
            self.open(BlockKind::Response);
            return None;
        }
        if trimmed.contains(BLOCK_CLOSE) {
            let state = std::mem::take(&mut self.state);
            let lines = std::mem::take(&mut self.lines);
            return match state {
                State::Idle => None,
                State::InBlock(BlockKind::Request) => Some(
                    parse_request(&lines)
                        .map(BlockEvent::Request)
                        .unwrap_or(BlockEvent::Malformed(BlockKind::Request)),
                ),
                State::InBlock(BlockKind::Response) => Some(
                    parse_response(&lines)
                        .map(BlockEvent::Response)
                        .unwrap_or(BlockEvent::Malformed(BlockKind::Response)),
                ),
            };
        }

        if let State::InBlock(_) = self.state {
            self.lines.push(line.to_string());
        }
        None
    }

    /// Drop any half-collected block and return to idle.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.lines.clear();
    }

    fn open(&mut self, kind: BlockKind) {
        self.state = State::InBlock(kind);
        self.lines.clear();
    }
}

/// Parse the lines of a closed request block.
pub fn parse_request(lines: &[String]) -> Option<PendingRequest> {
    let (index, first) = first_non_blank(lines)?;
    let mut tokens = first.split_whitespace();
    let method = tokens.next()?;
    let url = tokens.collect::<Vec<_>>().join(" ");
    if url.is_empty() {
        return None;
    }

    let (headers, body) = extract_headers_and_body(&lines[index + 1..]);
    Some(PendingRequest {
        url,
        method: method.to_string(),
        headers,
        body,
        timestamp: format_timestamp_now(),
        captured_at: Instant::now(),
    })
}

/// Parse the lines of a closed response block.
pub fn parse_response(lines: &[String]) -> Option<ParsedResponse> {
    let (index, first) = first_non_blank(lines)?;
    let captures = STATUS_LINE.captures(first)?;
    let status = captures.get(1)?.as_str().to_string();
    let url = captures.get(2)?.as_str().trim().to_string();

    let (headers, body) = extract_headers_and_body(&lines[index + 1..]);
    Some(ParsedResponse {
        url,
        status,
        headers,
        body,
    })
}

/// Split block lines into `Name: value` headers and a `Body:` section.
///
/// Blank lines before the body are skipped. Everything from the first
/// `Body:` line (case-insensitive) onward is the body, joined with
/// newlines and trimmed as a whole.
pub fn extract_headers_and_body(lines: &[String]) -> (Headers, String) {
    let mut headers = Headers::new();
    let mut body: Option<Vec<&str>> = None;

    for line in lines {
        if let Some(chunks) = body.as_mut() {
            chunks.push(line);
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = strip_body_marker(trimmed) {
            body = Some(vec![rest]);
            continue;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if !name.is_empty() {
                headers.insert(name.to_string(), value.trim_start().to_string());
            }
        }
    }

    let body = body.map(|chunks| chunks.join("\n").trim().to_string());
    (headers, body.unwrap_or_default())
}

fn strip_body_marker(trimmed: &str) -> Option<&str> {
    let marker = trimmed.get(..5)?;
    if marker.eq_ignore_ascii_case("body:") {
        Some(trimmed[5..].trim_start())
    } else {
        None
    }
}

fn first_non_blank(lines: &[String]) -> Option<(usize, &str)> {
    lines
        .iter()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i, line.trim()))
}
