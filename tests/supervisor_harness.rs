#![cfg(unix)]
//! Logcat supervisor integration harness.
//!
//! # What this covers
//!
//! - **Streaming**: producer stdout reaches the line buffer and observers as
//!   incremental `logcatUpdate` batches.
//! - **Relaunch on start**: a new `start` kills the old child, clears the
//!   buffer (broadcasting `logcatCleared`) and launches with the new
//!   arguments.
//! - **Backoff restart**: a producer that exits on its own is relaunched
//!   with the same parameters after the backoff.
//! - **Stop wins**: after `stop` no late backoff timer revives the producer,
//!   and a `stop` landing during a slow preflight prevents the launch and
//!   the buffer clear.
//! - **Spawn failure**: a producer that cannot be spawned goes through the
//!   same backoff restart path as one that exited.
//! - **Unavailable producer**: a failing preflight leaves the feed disabled.
//!
//! Producers are small `/bin/sh` scripts standing in for `adb logcat`.
//!
//! # What this does NOT cover
//!
//! - A real device or the real `adb` binary
//!
//! # Running
//!
//! ```sh
//! cargo test --test supervisor_harness
//! ```

mod common;
use common::*;

use futures::future::{BoxFuture, FutureExt};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracer_core::{EventKind, LogLevel};
use tracer_feeds::{FeedError, LaunchParams, LogcatSupervisor, Producer, SupervisorStatus};

const BACKOFF: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(5);

/// A producer that runs `script` under `/bin/sh`, with the launch params
/// available as `$1` (pid or `-`) and `$2` (level).
struct ShellProducer {
    program: PathBuf,
    script: String,
    available: AtomicBool,
    preflight_delay: Duration,
    preflights: AtomicUsize,
}

impl ShellProducer {
    fn new(script: &str) -> Arc<Self> {
        Arc::new(Self::build("/bin/sh", script, Duration::ZERO))
    }

    /// Preflight takes `delay` before reporting the device as present.
    fn slow(script: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build("/bin/sh", script, delay))
    }

    /// Preflight passes but the program cannot be spawned.
    fn unspawnable() -> Arc<Self> {
        Arc::new(Self::build("/nonexistent/tracer-producer", "exit 0", Duration::ZERO))
    }

    fn build(program: &str, script: &str, preflight_delay: Duration) -> Self {
        Self {
            program: PathBuf::from(program),
            script: script.to_string(),
            available: AtomicBool::new(true),
            preflight_delay,
            preflights: AtomicUsize::new(0),
        }
    }

    fn preflights(&self) -> usize {
        self.preflights.load(Ordering::SeqCst)
    }
}

impl Producer for ShellProducer {
    fn name(&self) -> &str {
        "shell producer"
    }

    fn program(&self) -> Option<&Path> {
        Some(&self.program)
    }

    fn args(&self, params: &LaunchParams) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.script.clone(),
            "producer".to_string(),
            params.pid.clone().unwrap_or_else(|| "-".to_string()),
            params.level.to_string(),
        ]
    }

    fn preflight(&self) -> BoxFuture<'_, Result<(), FeedError>> {
        self.preflights.fetch_add(1, Ordering::SeqCst);
        let available = self.available.load(Ordering::SeqCst);
        let delay = self.preflight_delay;
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if available {
                Ok(())
            } else {
                Err(FeedError::unavailable("shell producer", "no connected device detected"))
            }
        }
        .boxed()
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stdout_lines_reach_buffer_and_observers() {
    let engine = engine();
    let mut sub = engine.subscribe();
    next_event(&mut sub).await;

    let producer = ShellProducer::new("printf 'one\\ntwo\\n'; exec sleep 30");
    let supervisor = LogcatSupervisor::new(producer, Arc::clone(&engine), BACKOFF);
    supervisor.start(LaunchParams::default()).await.unwrap();

    assert_eq!(next_event(&mut sub).await.kind, EventKind::LogcatCleared);
    assert!(wait_until(WAIT, || engine.lines() == vec!["one", "two"]).await);
    let update = next_event_of(&mut sub, EventKind::LogcatUpdate).await;
    assert!(update.json()["lines"].as_array().unwrap().contains(&"one".into()));
    assert!(supervisor.status().is_active());

    supervisor.stop().await;
    assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
}

#[tokio::test]
async fn start_relaunches_with_new_arguments() {
    let engine = engine();
    let producer = ShellProducer::new("echo \"pid=$1 level=$2\"; exec sleep 30");
    let supervisor = LogcatSupervisor::new(producer, Arc::clone(&engine), BACKOFF);

    supervisor.start(LaunchParams::default()).await.unwrap();
    assert!(wait_until(WAIT, || engine.lines() == vec!["pid=- level=all"]).await);

    let mut sub = engine.subscribe();
    drain(&mut sub);
    supervisor
        .start(LaunchParams::new(Some("7450".into()), LogLevel::Warn))
        .await
        .unwrap();

    // The old context is gone before the new producer speaks.
    assert_eq!(next_event(&mut sub).await.kind, EventKind::LogcatCleared);
    assert!(wait_until(WAIT, || engine.lines() == vec!["pid=7450 level=warn"]).await);
    assert_eq!(supervisor.launches(), 2);
    assert_eq!(supervisor.params().pid.as_deref(), Some("7450"));

    supervisor.stop().await;
}

// ---------------------------------------------------------------------------
// Backoff restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn crashed_producer_restarts_with_same_params() {
    let engine = engine();
    let producer = ShellProducer::new("echo \"run level=$2\"; exit 1");
    let supervisor = LogcatSupervisor::new(producer, Arc::clone(&engine), BACKOFF);

    supervisor
        .start(LaunchParams::new(None, LogLevel::Error))
        .await
        .unwrap();

    assert!(wait_until(WAIT, || supervisor.launches() >= 3).await);
    assert_eq!(supervisor.params().level, LogLevel::Error);
    assert!(engine.lines().iter().all(|line| line == "run level=error"));

    supervisor.stop().await;
}

#[tokio::test]
async fn stop_prevents_late_restart() {
    let engine = engine();
    let producer = ShellProducer::new("exit 0");
    let supervisor = LogcatSupervisor::new(producer, Arc::clone(&engine), Duration::from_millis(200));

    supervisor.start(LaunchParams::default()).await.unwrap();
    assert!(wait_until(WAIT, || supervisor.launches() == 1).await);
    // Let the producer exit so the backoff timer is pending, then stop.
    assert!(wait_until(WAIT, || supervisor.status() == SupervisorStatus::Restarting).await);
    supervisor.stop().await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(supervisor.launches(), 1);
    assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
}

#[tokio::test]
async fn stop_during_preflight_prevents_launch() {
    let engine = engine();
    let mut sub = engine.subscribe();
    next_event(&mut sub).await;

    let producer = ShellProducer::slow("echo up; exec sleep 30", Duration::from_millis(300));
    let supervisor = LogcatSupervisor::new(producer, Arc::clone(&engine), BACKOFF);
    let starting = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { supervisor.start(LaunchParams::default()).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    supervisor.stop().await;
    // The superseded start finishes quietly.
    starting.await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
    assert_eq!(supervisor.launches(), 0);
    assert!(engine.lines().is_empty());
    let kinds: Vec<EventKind> = drain(&mut sub).into_iter().map(|event| event.kind).collect();
    assert!(!kinds.contains(&EventKind::LogcatCleared), "unexpected events: {kinds:?}");
}

#[tokio::test]
async fn newer_start_during_preflight_owns_the_feed() {
    let engine = engine();
    let producer = ShellProducer::slow("echo \"level=$2\"; exec sleep 30", Duration::from_millis(200));
    let supervisor = LogcatSupervisor::new(producer, Arc::clone(&engine), BACKOFF);

    let first = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { supervisor.start(LaunchParams::new(None, LogLevel::Debug)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    supervisor
        .start(LaunchParams::new(None, LogLevel::Error))
        .await
        .unwrap();
    first.await.unwrap().unwrap();

    assert!(wait_until(WAIT, || engine.lines() == vec!["level=error"]).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(supervisor.launches(), 1);

    supervisor.stop().await;
}

// ---------------------------------------------------------------------------
// Spawn failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spawn_error_takes_the_backoff_path() {
    let engine = engine();
    let producer = ShellProducer::unspawnable();
    let supervisor = LogcatSupervisor::new(producer.clone(), Arc::clone(&engine), BACKOFF);

    supervisor.start(LaunchParams::default()).await.unwrap();
    assert!(wait_until(WAIT, || supervisor.status() == SupervisorStatus::Restarting).await);
    // Each relaunch after the backoff re-runs preflight.
    assert!(wait_until(WAIT, || producer.preflights() >= 3).await);
    assert!(supervisor.status().is_active());
    assert_eq!(supervisor.launches(), 0);

    supervisor.stop().await;
    let preflights = producer.preflights();
    tokio::time::sleep(BACKOFF * 4).await;
    assert_eq!(producer.preflights(), preflights);
    assert_eq!(supervisor.launches(), 0);
    assert_eq!(supervisor.status(), SupervisorStatus::Stopped);
}

// ---------------------------------------------------------------------------
// Unavailable producer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_preflight_disables_until_next_start() {
    let engine = engine();
    let producer = ShellProducer::new("echo up; exec sleep 30");
    producer.available.store(false, Ordering::SeqCst);
    let supervisor = LogcatSupervisor::new(producer.clone(), Arc::clone(&engine), BACKOFF);

    let err = supervisor.start(LaunchParams::default()).await.unwrap_err();
    assert!(matches!(err, FeedError::ProducerUnavailable { .. }));
    assert_eq!(supervisor.status(), SupervisorStatus::Disabled);
    tokio::time::sleep(BACKOFF * 3).await;
    assert_eq!(supervisor.launches(), 0);

    producer.available.store(true, Ordering::SeqCst);
    supervisor.start(LaunchParams::default()).await.unwrap();
    assert!(wait_until(WAIT, || engine.lines() == vec!["up"]).await);

    supervisor.stop().await;
}
