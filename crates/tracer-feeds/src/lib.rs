//! tracer-feeds: trace feed sources for tracer.
//!
//! Each feed reads raw bytes from one source and pushes them into the shared
//! [`tracer_core::Engine`]: the supervised logcat producer appends device log
//! lines, the file tail drives a block pipeline.

pub mod error;
pub mod file;
pub mod logcat;
pub mod producer;

pub use error::FeedError;
pub use file::{FileTail, TailControl};
pub use logcat::{LogcatSupervisor, SupervisorStatus};
pub use producer::{Adb, LaunchParams, Producer};

use futures::future::BoxFuture;

/// Trait implemented by each running feed.
pub trait FeedHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Stop the feed and wait until its task (and any child process) is gone.
    fn shutdown(&self) -> BoxFuture<'_, ()>;
}
