//! Trace file tail.
//!
//! [`FileTail`] follows a block-structured trace file: existing content is
//! backfilled through a [`TracePipeline`] first, then appends are picked up
//! on filesystem notifications plus a periodic poll (some editors and
//! network filesystems never deliver events). When the file shrinks below
//! the read offset it was truncated, and reading restarts from offset 0
//! with a fresh parser.
//!
//! Clearing through a [`TailControl`] runs on the tail task itself: the file
//! is truncated and the reader reset in one step, so bytes the interceptor
//! writes right after the clear are read from offset 0.

use crate::error::Result;
use crate::FeedHandle;
use futures::future::{BoxFuture, FutureExt};
use notify::{RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracer_core::{Engine, TracePipeline};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Offset-tracking reader feeding a pipeline. Driven by exactly one task.
pub struct TailReader {
    path: PathBuf,
    offset: u64,
    pipeline: TracePipeline,
}

impl TailReader {
    pub fn new(path: impl Into<PathBuf>, engine: Arc<Engine>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            pipeline: TracePipeline::new(engine),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read whatever was appended since the last call. Returns the number
    /// of transactions completed.
    pub async fn poll(&mut self) -> Result<usize> {
        let len = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        if len < self.offset {
            tracing::info!(path = %self.path.display(), "trace file truncated; reading from start");
            self.offset = 0;
            self.pipeline.reset();
        }
        if len == self.offset {
            return Ok(0);
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut chunk = Vec::with_capacity((len - self.offset) as usize);
        file.take(len - self.offset).read_to_end(&mut chunk).await?;

        self.offset += chunk.len() as u64;
        Ok(self.pipeline.feed_chunk(&chunk).len())
    }

    /// Empty the file and forget everything read from it.
    pub async fn clear(&mut self) -> Result<()> {
        truncate(&self.path).await?;
        self.offset = 0;
        self.pipeline.reset();
        tracing::info!(path = %self.path.display(), "trace file cleared");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

type ClearReply = oneshot::Sender<Result<()>>;

pub struct FileTail {
    path: PathBuf,
    control: TailControl,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle for clearing a followed file.
#[derive(Clone)]
pub struct TailControl {
    path: PathBuf,
    clear_tx: mpsc::Sender<ClearReply>,
}

impl TailControl {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the file and reset the tail's offset and parser before it
    /// reads again. Once the tail has stopped the file is just truncated.
    pub async fn clear(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.clear_tx.send(reply_tx).await.is_err() {
            return truncate(&self.path).await;
        }
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => truncate(&self.path).await,
        }
    }
}

impl FileTail {
    /// Create the file if missing, backfill it, and start following.
    pub async fn spawn(path: impl Into<PathBuf>, engine: Arc<Engine>, poll_interval: Duration) -> Result<Self> {
        let path = path.into();
        ensure_exists(&path).await?;

        let mut reader = TailReader::new(&path, engine);
        let backfilled = reader.poll().await?;
        tracing::info!(
            path = %path.display(),
            transactions = backfilled,
            "watching trace file"
        );

        // Capacity 1: a pending wake-up already covers any further events.
        let (wake_tx, wake_rx) = mpsc::channel::<()>(1);
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = wake_tx.try_send(());
            }
        })
        .and_then(|mut watcher| {
            watcher.watch(&path, RecursiveMode::NonRecursive)?;
            Ok(watcher)
        });
        let watcher = match watcher {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!(error = %err, "file watcher unavailable; falling back to polling");
                None
            }
        };

        let (clear_tx, clear_rx) = mpsc::channel::<ClearReply>(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(follow(
            reader,
            watcher,
            Signals {
                wake: wake_rx,
                clear: clear_rx,
            },
            poll_interval,
            cancel.clone(),
        ));

        Ok(Self {
            control: TailControl {
                path: path.clone(),
                clear_tx,
            },
            path,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn control(&self) -> TailControl {
        self.control.clone()
    }

    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    tracing::warn!(error = %err, "trace file tail task failed");
                }
            }
        }
    }
}

impl FeedHandle for FileTail {
    fn name(&self) -> &str {
        "trace file"
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        self.stop().boxed()
    }
}

struct Signals {
    wake: mpsc::Receiver<()>,
    clear: mpsc::Receiver<ClearReply>,
}

async fn follow(
    mut reader: TailReader,
    watcher: Option<notify::RecommendedWatcher>,
    mut signals: Signals,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    // Dropping the watcher stops notifications.
    let _watcher = watcher;
    let mut tick = tokio::time::interval(poll_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(reply) = signals.clear.recv() => {
                let _ = reply.send(reader.clear().await);
                continue;
            }
            Some(()) = signals.wake.recv() => {}
            _ = tick.tick() => {}
        }
        if let Err(err) = reader.poll().await {
            tracing::warn!(path = %reader.path.display(), error = %err, "trace file read failed");
        }
    }
    tracing::debug!(path = %reader.path.display(), "trace file tail stopped");
}

async fn ensure_exists(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    tracing::info!(path = %path.display(), "created trace file");
    Ok(())
}

/// Empty the trace file in place. A tail following it notices the shrink
/// on its next read; use [`TailControl::clear`] to reset it right away.
pub async fn truncate(path: &Path) -> Result<()> {
    tokio::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .await?;
    Ok(())
}
