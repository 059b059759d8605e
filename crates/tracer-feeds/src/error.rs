use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The producer binary or its target device is missing. The feed stays
    /// disabled until the next explicit start.
    #[error("{producer} unavailable: {reason}")]
    ProducerUnavailable { producer: String, reason: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    pub fn unavailable(producer: impl Into<String>, reason: impl Into<String>) -> Self {
        FeedError::ProducerUnavailable {
            producer: producer.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
