//! Trace producers: what the supervisor launches.
//!
//! A [`Producer`] knows where its binary lives, how to turn
//! [`LaunchParams`] into arguments, and how to check that it has something
//! to talk to before launching. [`Adb`] is the real device-log producer.

use crate::error::{FeedError, Result};
use futures::future::{BoxFuture, FutureExt};
use phf::phf_map;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracer_core::LogLevel;

/// Filter parameters applied by relaunching the producer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    /// Only stream lines from this process id.
    pub pid: Option<String>,
    pub level: LogLevel,
}

impl LaunchParams {
    pub fn new(pid: Option<String>, level: LogLevel) -> Self {
        let pid = pid.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        Self { pid, level }
    }
}

pub trait Producer: Send + Sync + 'static {
    /// Short name for log messages.
    fn name(&self) -> &str;

    /// Resolved binary, or `None` when it could not be found.
    fn program(&self) -> Option<&Path>;

    fn args(&self, params: &LaunchParams) -> Vec<String>;

    /// Checked before every launch; an error disables the feed.
    fn preflight(&self) -> BoxFuture<'_, Result<()>>;
}

// ---------------------------------------------------------------------------
// adb logcat
// ---------------------------------------------------------------------------

/// Severity floor → logcat filter-spec token. `all` is absent on purpose:
/// it adds no flag.
static LEVEL_FLAGS: phf::Map<&'static str, &'static str> = phf_map! {
    "verbose" => "*:V",
    "debug" => "*:D",
    "info" => "*:I",
    "warn" => "*:W",
    "error" => "*:E",
};

/// `adb logcat` as a trace producer.
#[derive(Debug, Clone)]
pub struct Adb {
    program: Option<PathBuf>,
}

impl Adb {
    /// Resolve the binary once: explicit override, then `PATH`, then the
    /// usual SDK install directories.
    pub fn resolve(override_path: Option<&Path>) -> Self {
        let program = resolve_binary("adb", override_path, &well_known_dirs());
        match &program {
            Some(path) => tracing::info!(path = %path.display(), "resolved adb"),
            None => tracing::warn!(
                "adb not found on PATH; logcat streaming disabled. Install Android platform-tools or set TRACER_ADB_PATH"
            ),
        }
        Self { program }
    }

    pub fn with_program(program: Option<PathBuf>) -> Self {
        Self { program }
    }
}

impl Producer for Adb {
    fn name(&self) -> &str {
        "adb logcat"
    }

    fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    fn args(&self, params: &LaunchParams) -> Vec<String> {
        logcat_args(params)
    }

    fn preflight(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            let program = self
                .program
                .as_deref()
                .ok_or_else(|| FeedError::unavailable(self.name(), "adb binary not found"))?;
            let output = tokio::process::Command::new(program)
                .arg("devices")
                .output()
                .await
                .map_err(|source| FeedError::Spawn {
                    program: program.to_path_buf(),
                    source,
                })?;
            let devices = parse_devices(&String::from_utf8_lossy(&output.stdout));
            if devices.is_empty() {
                return Err(FeedError::unavailable(self.name(), "no connected device detected"));
            }
            tracing::debug!(devices = ?devices, "adb devices");
            Ok(())
        }
        .boxed()
    }
}

/// `logcat -v threadtime [--pid=<pid>] [*:<L>]`
pub fn logcat_args(params: &LaunchParams) -> Vec<String> {
    let mut args = vec!["logcat".to_string(), "-v".to_string(), "threadtime".to_string()];
    if let Some(pid) = &params.pid {
        args.push(format!("--pid={pid}"));
    }
    if let Some(flag) = LEVEL_FLAGS.get(params.level.as_str()) {
        args.push((*flag).to_string());
    }
    args
}

/// Serial numbers of attached devices from `adb devices` output.
pub fn parse_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter_map(|line| line.strip_suffix("\tdevice"))
        .map(str::to_string)
        .filter(|serial| !serial.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Binary lookup
// ---------------------------------------------------------------------------

/// Find `name`: an existing `override_path` wins, then `PATH` extended with
/// `extra_dirs`.
pub fn resolve_binary(name: &str, override_path: Option<&Path>, extra_dirs: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "producer override does not exist; searching PATH");
    }

    let mut dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect())
        .unwrap_or_default();
    dirs.extend(extra_dirs.iter().cloned());
    let search: OsString = std::env::join_paths(dirs).ok()?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    which::which_in(name, Some(search), cwd).ok()
}

fn well_known_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = ["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin", "/bin"]
        .into_iter()
        .map(PathBuf::from)
        .collect();
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        dirs.push(home.join("Library/Android/sdk/platform-tools"));
        dirs.push(home.join("Android/Sdk/platform-tools"));
    }
    if let Some(local) = std::env::var_os("LOCALAPPDATA").map(PathBuf::from) {
        dirs.push(local.join("Android").join("Sdk").join("platform-tools"));
    }
    dirs
}
