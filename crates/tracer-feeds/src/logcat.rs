//! Supervised logcat feed.
//!
//! [`LogcatSupervisor`] owns the producer subprocess. Every [`start`]
//! supersedes the previous run: the generation counter is bumped, the old
//! child is killed and awaited, the line buffer is cleared (broadcasting
//! `logcatCleared`), and a fresh supervise task is spawned for the new
//! generation.
//!
//! The supervise task relaunches the producer after a fixed backoff when
//! it exits on its own. Before acting it compares its captured generation
//! with the current one, so a superseded or stopped run never comes back.
//!
//! [`start`]: LogcatSupervisor::start

use crate::error::{FeedError, Result};
use crate::producer::{LaunchParams, Producer};
use crate::FeedHandle;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracer_core::lines::LineSplitter;
use tracer_core::Engine;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStatus {
    /// Never started.
    Idle,
    /// A producer is running, or about to be spawned.
    Running,
    /// The producer exited; waiting out the backoff before relaunching.
    Restarting,
    /// Binary or device missing. Stays here until the next `start`.
    Disabled,
    /// Shut down explicitly.
    Stopped,
}

impl SupervisorStatus {
    /// True while the supervisor intends to keep a producer alive.
    pub fn is_active(self) -> bool {
        matches!(self, SupervisorStatus::Running | SupervisorStatus::Restarting)
    }
}

#[derive(Clone)]
pub struct LogcatSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    producer: Arc<dyn Producer>,
    engine: Arc<Engine>,
    backoff: Duration,
    state: Mutex<State>,
}

struct State {
    generation: u64,
    params: LaunchParams,
    status: SupervisorStatus,
    launches: u64,
    run: Option<Run>,
}

struct Run {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Run {
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            if !err.is_cancelled() {
                tracing::warn!(error = %err, "logcat supervise task failed");
            }
        }
    }
}

enum RunOutcome {
    Cancelled,
    Exited,
}

impl LogcatSupervisor {
    pub fn new(producer: Arc<dyn Producer>, engine: Arc<Engine>, backoff: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                producer,
                engine,
                backoff,
                state: Mutex::new(State {
                    generation: 0,
                    params: LaunchParams::default(),
                    status: SupervisorStatus::Idle,
                    launches: 0,
                    run: None,
                }),
            }),
        }
    }

    /// Supersede any running producer and launch a new one with `params`.
    ///
    /// Returns [`FeedError::ProducerUnavailable`] when the binary or the
    /// device is missing; the supervisor is then disabled until the next
    /// call. The parameters are remembered either way.
    pub async fn start(&self, params: LaunchParams) -> Result<()> {
        let (generation, previous) = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.params = params.clone();
            state.status = SupervisorStatus::Running;
            (state.generation, state.run.take())
        };

        if let Some(run) = previous {
            tracing::info!(
                pid = ?params.pid,
                level = %params.level,
                "stopping existing logcat stream"
            );
            run.stop().await;
        }

        if !self.inner.prepare(generation).await? {
            tracing::debug!(generation, "logcat start superseded during preflight");
            return Ok(());
        }

        // Checked and stored under one lock so a concurrent `stop` either
        // sees this run or makes us skip the spawn entirely.
        let mut state = self.inner.state.lock();
        if state.generation != generation {
            tracing::debug!(generation, "logcat start superseded before launch");
            return Ok(());
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(supervise(
            Arc::clone(&self.inner),
            generation,
            cancel.clone(),
        ));
        state.run = Some(Run { cancel, task });
        Ok(())
    }

    /// Stop the producer and wait for it to exit. No restart follows.
    pub async fn stop(&self) {
        let run = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.status = SupervisorStatus::Stopped;
            state.run.take()
        };
        if let Some(run) = run {
            run.stop().await;
            tracing::info!("logcat stream stopped");
        }
    }

    pub fn status(&self) -> SupervisorStatus {
        self.inner.state.lock().status
    }

    pub fn params(&self) -> LaunchParams {
        self.inner.state.lock().params.clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.state.lock().generation
    }

    /// Number of producer processes spawned so far, restarts included.
    pub fn launches(&self) -> u64 {
        self.inner.state.lock().launches
    }
}

impl FeedHandle for LogcatSupervisor {
    fn name(&self) -> &str {
        self.inner.producer.name()
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        self.stop().boxed()
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    /// Update the status unless the generation has moved on.
    fn set_status(&self, generation: u64, status: SupervisorStatus) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.status = status;
        }
    }

    /// Availability checks, then a fresh line buffer for the new context.
    ///
    /// Returns `Ok(false)` when `generation` was superseded while the checks
    /// ran; nothing is cleared or disabled in that case.
    async fn prepare(&self, generation: u64) -> Result<bool> {
        let checked = match self.producer.program() {
            Some(_) => self.producer.preflight().await,
            None => Err(FeedError::unavailable(self.producer.name(), "binary not found")),
        };

        let mut state = self.state.lock();
        if state.generation != generation {
            return Ok(false);
        }
        if let Err(err) = checked {
            tracing::warn!(error = %err, "logcat streaming disabled");
            state.status = SupervisorStatus::Disabled;
            return Err(err);
        }
        self.engine.clear_lines();
        Ok(true)
    }
}

async fn supervise(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    loop {
        if let RunOutcome::Cancelled = run_once(&inner, generation, &cancel).await {
            return;
        }

        inner.set_status(generation, SupervisorStatus::Restarting);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(inner.backoff) => {}
        }
        if !inner.is_current(generation) {
            return;
        }

        tracing::info!(generation, "restarting logcat stream");
        match inner.prepare(generation).await {
            Ok(true) => {}
            Ok(false) | Err(_) => return,
        }
        inner.set_status(generation, SupervisorStatus::Running);
    }
}

/// Spawn one producer and pump its output until it exits or the run is
/// cancelled.
async fn run_once(inner: &Inner, generation: u64, cancel: &CancellationToken) -> RunOutcome {
    if cancel.is_cancelled() || !inner.is_current(generation) {
        return RunOutcome::Cancelled;
    }
    let Some(program) = inner.producer.program() else {
        return RunOutcome::Exited;
    };
    let params = inner.state.lock().params.clone();
    let args = inner.producer.args(&params);

    tracing::info!(
        generation,
        pid = ?params.pid,
        level = %params.level,
        "starting {}",
        inner.producer.name()
    );

    let mut child = match Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(source) => {
            let err = FeedError::Spawn {
                program: program.to_path_buf(),
                source,
            };
            tracing::error!(error = %err, "failed to start logcat process");
            return RunOutcome::Exited;
        }
    };
    inner.state.lock().launches += 1;

    let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(log_stderr(stderr)));

    let cancelled = match child.stdout.take() {
        Some(stdout) => tokio::select! {
            _ = cancel.cancelled() => true,
            _ = pump_lines(stdout, &inner.engine) => false,
        },
        None => false,
    };

    let cancelled = cancelled || {
        tokio::select! {
            _ = cancel.cancelled() => true,
            status = child.wait() => {
                match status {
                    Ok(status) => tracing::warn!(%status, "logcat process exited"),
                    Err(err) => tracing::warn!(error = %err, "logcat process wait failed"),
                }
                false
            }
        }
    };

    if let Some(task) = stderr_task {
        task.abort();
    }

    if cancelled {
        if let Err(err) = child.kill().await {
            tracing::debug!(error = %err, "logcat process already gone");
        }
        return RunOutcome::Cancelled;
    }
    RunOutcome::Exited
}

/// Read `reader` to EOF, appending each batch of completed lines to the
/// engine's line buffer. A trailing partial line at EOF is dropped.
pub async fn pump_lines<R>(mut reader: R, engine: &Engine)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => engine.append_lines(splitter.push(&buf[..n])),
            Err(err) => {
                tracing::warn!(error = %err, "logcat stdout read failed");
                break;
            }
        }
    }
}

async fn log_stderr<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            tracing::warn!(stderr = %line, "logcat stderr");
        }
    }
}
