//! Shared application state handed to every handler.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracer_core::hub::KEEP_ALIVE_INTERVAL;
use tracer_core::Engine;
use tracer_feeds::file::TailControl;
use tracer_feeds::LogcatSupervisor;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// `None` when the device log feed is not wired up at all.
    pub logcat: Option<LogcatSupervisor>,
    /// Tailed trace file, truncated by `POST /clear`.
    pub trace_file: Option<PathBuf>,
    /// The tail following `trace_file`, reset together with the truncation.
    pub tail: Option<TailControl>,
    pub keep_alive: Duration,
    /// Pid selection as last posted by a client; only the first one is
    /// handed to the producer.
    pub pids: Arc<Mutex<Vec<String>>>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            logcat: None,
            trace_file: None,
            tail: None,
            keep_alive: KEEP_ALIVE_INTERVAL,
            pids: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_logcat(mut self, logcat: LogcatSupervisor) -> Self {
        self.logcat = Some(logcat);
        self
    }

    pub fn with_trace_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_file = Some(path.into());
        self
    }

    /// Clear the trace file through its tail rather than behind its back.
    pub fn with_tail(mut self, tail: TailControl) -> Self {
        self.trace_file = Some(tail.path().to_path_buf());
        self.tail = Some(tail);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// `"file"` when a trace file is tailed, `"logcat"` otherwise.
    pub fn source(&self) -> &'static str {
        if self.trace_file.is_some() {
            "file"
        } else {
            "logcat"
        }
    }

    pub fn streaming(&self) -> bool {
        self.logcat
            .as_ref()
            .is_some_and(|logcat| logcat.status().is_active())
    }
}
