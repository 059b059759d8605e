//! Configuration types for tracer.
//!
//! [`Config::load`] reads `~/.config/tracer/config.toml`, creating it with
//! hardcoded defaults if it does not yet exist, then applies the `TRACER_*`
//! environment overrides. [`Config::defaults`] returns the same defaults
//! without touching the filesystem or the environment (useful in tests).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[server]
host            = "127.0.0.1"
port            = 3000
port_attempts   = 20
keep_alive_secs = 25

[logcat]
max_lines          = 5000
restart_backoff_ms = 1000

[trace]
pending_ttl_secs = 300

[filter]
exclude = []
"#;

/// Trace file to tail for request/response blocks.
pub const ENV_TRACE_FILE: &str = "TRACER_LOG";
/// Comma-separated exclusion patterns.
pub const ENV_EXCLUDES: &str = "TRACER_EXCLUDES";
/// Explicit path to the producer binary.
pub const ENV_PRODUCER_PATH: &str = "TRACER_ADB_PATH";

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logcat: LogcatConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

/// `[server]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How many consecutive ports to try when the preferred one is taken.
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u16,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3000 }
fn default_port_attempts() -> u16 { 20 }
fn default_keep_alive_secs() -> u64 { 25 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            port_attempts: default_port_attempts(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl ServerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

/// `[logcat]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogcatConfig {
    /// Capacity of the trace-line ring buffer.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,
    /// Explicit producer binary; overrides PATH lookup.
    #[serde(default)]
    pub binary: Option<PathBuf>,
}

fn default_max_lines() -> usize { 5000 }
fn default_restart_backoff_ms() -> u64 { 1000 }

impl Default for LogcatConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            restart_backoff_ms: default_restart_backoff_ms(),
            binary: None,
        }
    }
}

impl LogcatConfig {
    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }
}

/// `[trace]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceConfig {
    /// Block-structured trace file to tail. Tailing is off when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Age after which an unanswered request is evicted; `0` keeps it forever.
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,
}

fn default_pending_ttl_secs() -> u64 { 300 }

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            file: None,
            pending_ttl_secs: default_pending_ttl_secs(),
        }
    }
}

impl TraceConfig {
    pub fn pending_ttl(&self) -> Option<Duration> {
        (self.pending_ttl_secs > 0).then(|| Duration::from_secs(self.pending_ttl_secs))
    }
}

/// `[filter]` section of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `~/.config/tracer/config.toml`, layered on top of the
    /// built-in defaults. Creates the file with defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CONFIG.trim_start())?;
        }

        Self::load_from(&path)
    }

    /// Load from an explicit file, which must exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    /// Apply `TRACER_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(file) = lookup(ENV_TRACE_FILE).filter(|v| !v.trim().is_empty()) {
            self.trace.file = Some(PathBuf::from(file.trim()));
        }
        if let Some(binary) = lookup(ENV_PRODUCER_PATH).filter(|v| !v.trim().is_empty()) {
            self.logcat.binary = Some(PathBuf::from(binary.trim()));
        }
        if let Some(excludes) = lookup(ENV_EXCLUDES) {
            for pattern in excludes.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                if !self.filter.exclude.iter().any(|p| p == pattern) {
                    self.filter.exclude.push(pattern.to_string());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("tracer")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
