//! Error and drop-reason types for tracer-core.

use crate::types::BlockKind;

/// Errors surfaced to callers of the engine's mutation API.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// An empty or invalid pattern/filter payload. No state was changed.
    #[error("mutation rejected: {0}")]
    MutationRejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TraceError>;

/// Why a block or record never became a transaction.
///
/// Drops are routine (partial producer output, filtered hosts) and are
/// logged rather than raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The block could not be parsed into a request or response.
    MalformedBlock { kind: BlockKind },
    /// A response arrived for a URL with no pending request.
    UnmatchedResponse { url: String },
    /// The URL matched an exclusion pattern.
    Excluded { kind: BlockKind, url: String },
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::MalformedBlock { kind } => write!(f, "malformed {kind} block"),
            DropReason::UnmatchedResponse { url } => {
                write!(f, "response for {url} has no pending request")
            }
            DropReason::Excluded { kind, url } => write!(f, "{kind} for {url} is excluded"),
        }
    }
}
