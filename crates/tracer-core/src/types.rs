//! Core types for tracer-core.
//!
//! This module defines the data structures shared across the engine: the
//! parsed [`PendingRequest`] and [`ParsedResponse`] halves produced by the
//! block parser, the loosely-typed [`RawTransaction`] handed to the store,
//! and the terminal [`Transaction`] pushed to observers.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Header map as captured from a trace block. Ordered by name so that
/// serialised transactions are stable.
pub type Headers = BTreeMap<String, String>;

/// A parsed request waiting in the correlation store for its response.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub url: String,
    pub method: String,
    pub headers: Headers,
    pub body: String,
    /// Wall-clock capture time, already formatted as `MM-DD HH:MM:SS.mmm`.
    pub timestamp: String,
    /// Monotonic capture time, used for pending-queue expiry.
    pub captured_at: Instant,
}

/// The response half of a block pair, before correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub url: String,
    /// Status token exactly as it appeared on the status line.
    pub status: String,
    pub headers: Headers,
    pub body: String,
}

/// A matched request/response pair prior to normalisation.
///
/// Every field is optional; [`crate::normalizer::normalize`] fills in the
/// gaps and coerces the status into a number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTransaction {
    pub id: Option<u64>,
    pub timestamp: Option<String>,
    pub method: Option<String>,
    pub url: Option<String>,
    pub request_headers: Headers,
    pub request_body: Option<String>,
    pub response_status: Option<String>,
    pub response_time_ms: Option<u64>,
    pub response_headers: Headers,
    pub response_body: Option<String>,
}

impl RawTransaction {
    /// Merge a pending request with the response that completed it.
    pub fn from_pair(request: PendingRequest, response: ParsedResponse) -> Self {
        Self {
            id: None,
            timestamp: Some(request.timestamp),
            method: Some(request.method),
            url: Some(response.url),
            request_headers: request.headers,
            request_body: Some(request.body),
            response_status: Some(response.status),
            // The block source carries no timing information.
            response_time_ms: Some(0),
            response_headers: response.headers,
            response_body: Some(response.body),
        }
    }
}

/// One fully correlated HTTP exchange, the unit shown to observers.
///
/// Immutable once created; the store only ever prepends and evicts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: u64,
    pub timestamp: String,
    pub method: String,
    pub url: String,
    pub request_headers: Headers,
    pub request_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body_parsed: Option<serde_json::Value>,
    pub response_status: Option<u16>,
    pub response_time_ms: u64,
    pub response_headers: Headers,
    pub response_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body_parsed: Option<serde_json::Value>,
}

/// Which kind of block the parser is (or was) collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Request,
    Response,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Request => write!(f, "request"),
            BlockKind::Response => write!(f, "response"),
        }
    }
}

/// Producer-side severity floor for the device log stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    All,
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::All => "all",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = crate::TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(LogLevel::All),
            "verbose" => Ok(LogLevel::Verbose),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(crate::TraceError::MutationRejected(format!(
                "unknown log level: {other:?}"
            ))),
        }
    }
}
