//! tracer: live HTTP(S) trace viewer correlated with the device log.
//!
//! This crate wires the layers together so that the binary and the
//! integration harnesses start the system the same way.
//!
//! # Architecture
//!
//! ```text
//! adb logcat ──► LogcatSupervisor ──┐
//!                                   ├──► Engine ──► BroadcastHub ──► /events
//! trace file ──► FileTail ──────────┘       ▲
//!                                           └── HTTP mutations
//! ```
//!
//! Feeds run on background tasks; the HTTP surface drives the main task
//! until a [`ShutdownSignal`] arrives.

pub use tracer_core::config::Config;
pub use tracer_core::{Engine, Transaction};
pub use tracer_feeds::{FeedHandle, LaunchParams};
pub use tracer_web::AppState;

use std::sync::Arc;
#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracer_feeds::file::{FileTail, DEFAULT_POLL_INTERVAL};
use tracer_feeds::{Adb, LogcatSupervisor};

/// A running engine plus the feeds pushing into it.
pub struct Tracer {
    pub engine: Arc<Engine>,
    pub state: AppState,
    feeds: Vec<Box<dyn FeedHandle>>,
}

impl Tracer {
    /// Build the engine and start every configured feed.
    ///
    /// The trace file tail is started when `config.trace.file` is set. The
    /// logcat feed is always wired up; a missing binary or device only
    /// leaves it disabled.
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let engine = Arc::new(Engine::new(config));
        let mut state = AppState::new(Arc::clone(&engine)).with_keep_alive(config.server.keep_alive());
        let mut feeds: Vec<Box<dyn FeedHandle>> = Vec::new();

        if let Some(path) = &config.trace.file {
            let tail = FileTail::spawn(path, Arc::clone(&engine), DEFAULT_POLL_INTERVAL).await?;
            state = state.with_tail(tail.control());
            feeds.push(Box::new(tail));
        }

        let producer = Arc::new(Adb::resolve(config.logcat.binary.as_deref()));
        let logcat = LogcatSupervisor::new(producer, Arc::clone(&engine), config.logcat.restart_backoff());
        if let Err(err) = logcat.start(LaunchParams::default()).await {
            tracing::debug!(error = %err, "logcat feed not started");
        }
        state = state.with_logcat(logcat.clone());
        feeds.push(Box::new(logcat));

        Ok(Self { engine, state, feeds })
    }

    /// Stop every feed, killing and awaiting any producer process.
    pub async fn shutdown(self) {
        for feed in &self.feeds {
            tracing::debug!(feed = feed.name(), "stopping feed");
            feed.shutdown().await;
        }
        tracing::info!("all feeds stopped");
    }
}

/// Termination requests that trigger a graceful shutdown: Ctrl-C everywhere,
/// plus SIGTERM on unix.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignal {
    /// Register the handlers. Until this runs, SIGTERM still kills the
    /// process without stopping the feeds.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next request and name it.
    pub async fn recv(&mut self) -> std::io::Result<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                interrupted = tokio::signal::ctrl_c() => interrupted.map(|()| "interrupt"),
                _ = self.terminate.recv() => Ok("terminate"),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.map(|()| "interrupt")
        }
    }
}
