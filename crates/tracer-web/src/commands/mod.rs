// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

use crate::{app::AppState, error::ApiError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracer_core::LogLevel;
use tracer_feeds::LaunchParams;

/// A parsed, validated mutation ready to be executed against the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Start excluding URLs containing the pattern
    Exclude(String),
    // Stop excluding the pattern
    Include(String),
    // Relaunch the producer for the first pid (or all) at the given level;
    // a missing level keeps the current one
    SetFilter {
        pids: Vec<String>,
        level: Option<LogLevel>,
    },
    // Relaunch the producer at a new level, keeping the pid
    SetLevel(LogLevel),
    // Empty the device log buffer
    ClearLogcat,
    // Drop the transaction history (and truncate the trace file)
    ClearLogs,
}

/// Loose request body shared by every mutation route. Each command picks
/// the fields it needs.
#[derive(Debug, Default, Deserialize)]
pub struct CommandBody {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub pids: Option<Vec<Value>>,
    #[serde(default)]
    pub level: Option<String>,
}

impl Command {
    /// Parse a mutation from its route name (the path without the leading
    /// `/`) and request body.
    pub fn parse(action: &str, body: CommandBody) -> Result<Command, ApiError> {
        match action {
            "exclude" => Ok(Command::Exclude(required_pattern(body.pattern)?)),
            "include" => Ok(Command::Include(required_pattern(body.pattern)?)),
            "logcat/filter" => {
                let pids = body
                    .pids
                    .unwrap_or_default()
                    .into_iter()
                    .map(|pid| match pid {
                        Value::String(s) => s.trim().to_string(),
                        other => other.to_string(),
                    })
                    .filter(|pid| !pid.is_empty())
                    .collect();
                let level = match body.level.as_deref().map(str::trim) {
                    None | Some("") => None,
                    Some(level) => Some(level.parse::<LogLevel>()?),
                };
                Ok(Command::SetFilter { pids, level })
            }
            "logcat/level" => match body.level.as_deref().map(str::trim) {
                None | Some("") => Ok(Command::SetLevel(LogLevel::All)),
                Some(level) => Ok(Command::SetLevel(level.parse()?)),
            },
            "logcat/clear" => Ok(Command::ClearLogcat),
            "clear" => Ok(Command::ClearLogs),
            other => Err(ApiError::BadRequest(format!("unknown command: {other}"))),
        }
    }
}

fn required_pattern(pattern: Option<String>) -> Result<String, ApiError> {
    match pattern.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => Ok(p.to_string()),
        _ => Err(ApiError::BadRequest("Pattern is required".to_string())),
    }
}

/// Execute a parsed [`Command`] and build the JSON reply.
pub async fn execute_command(s: &AppState, cmd: Command) -> Result<Value, ApiError> {
    match cmd {
        Command::Exclude(pattern) => {
            s.engine.add_exclusion(&pattern)?;
            Ok(json!({ "ok": true }))
        }
        Command::Include(pattern) => {
            s.engine.remove_exclusion(&pattern)?;
            Ok(json!({ "ok": true }))
        }
        Command::SetFilter { pids, level } => {
            let level = level.unwrap_or_else(|| current_params(s).level);
            *s.pids.lock() = pids.clone();
            relaunch(s, LaunchParams::new(pids.first().cloned(), level)).await;
            Ok(json!({
                "ok": true,
                "pids": pids,
                "level": level,
                "streaming": s.streaming(),
            }))
        }
        Command::SetLevel(level) => {
            let pid = current_params(s).pid;
            relaunch(s, LaunchParams::new(pid, level)).await;
            Ok(json!({
                "ok": true,
                "level": level,
                "streaming": s.streaming(),
            }))
        }
        Command::ClearLogcat => {
            s.engine.clear_lines();
            Ok(json!({ "ok": true }))
        }
        Command::ClearLogs => {
            if let Some(path) = &s.trace_file {
                let truncated = match &s.tail {
                    Some(tail) => tail.clear().await,
                    None => tracer_feeds::file::truncate(path).await,
                };
                if let Err(err) = truncated {
                    tracing::error!(path = %path.display(), error = %err, "failed to clear trace file");
                    return Err(ApiError::Internal("Failed to clear log file".to_string()));
                }
            }
            let cleared = s.engine.clear_history();
            tracing::info!(cleared, "transaction history cleared by client");
            Ok(json!({ "ok": true, "cleared": cleared }))
        }
    }
}

pub fn current_params(s: &AppState) -> LaunchParams {
    s.logcat
        .as_ref()
        .map(|logcat| logcat.params())
        .unwrap_or_default()
}

async fn relaunch(s: &AppState, params: LaunchParams) {
    let Some(logcat) = &s.logcat else {
        tracing::debug!("no logcat feed; filter change ignored");
        return;
    };
    if let Err(err) = logcat.start(params).await {
        tracing::debug!(error = %err, "logcat relaunch skipped");
    }
}
