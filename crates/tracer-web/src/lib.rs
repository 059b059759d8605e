//! tracer web: HTTP control surface and live event stream.
//!
//! | Route                  | Method | Reply |
//! |------------------------|--------|-------|
//! | `/events`              | GET    | SSE: `init`, then live hub events |
//! | `/logs`                | GET    | `{transactions, excludedPatterns}` |
//! | `/logcat`              | GET    | `{lines}` |
//! | `/logcat/filter`       | GET    | `{pids, level}` |
//! | `/logcat/filter`       | POST   | `{ok, pids, level, streaming}` |
//! | `/logcat/level`        | POST   | `{ok, level, streaming}` |
//! | `/logcat/clear`        | POST   | `{ok}` |
//! | `/clear`               | POST   | `{ok, cleared}` |
//! | `/exclude`, `/include` | POST   | `{ok}` |
//! | `/config`              | GET    | `{logcatMaxLines, source}` |

pub mod app;
pub mod commands;
pub mod error;
pub mod event;

pub use app::AppState;
pub use error::ApiError;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use commands::{current_params, execute_command, Command, CommandBody};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(events))
        .route("/logs", get(logs))
        .route("/logcat", get(logcat_lines))
        .route("/logcat/filter", get(logcat_filter).post(set_filter))
        .route("/logcat/level", post(set_level))
        .route("/logcat/clear", post(clear_logcat))
        .route("/clear", post(clear_logs))
        .route("/exclude", post(exclude))
        .route("/include", post(include))
        .route("/config", get(config))
        .with_state(state)
}

/// Bind `host:port`, moving up one port at a time while the address is in
/// use, for at most `attempts` ports.
pub async fn bind_with_fallback(host: &str, port: u16, attempts: u16) -> std::io::Result<TcpListener> {
    let attempts = attempts.max(1);
    let mut last_err = None;
    for offset in 0..attempts {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!(requested = port, bound = candidate, "port in use; using next free port");
                }
                return Ok(listener);
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port = candidate, "port in use");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrInUse, "no free port in range")
    }))
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!("tracer listening on http://{addr}");
    axum::serve(listener, router(state)).await
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn events(State(s): State<AppState>) -> impl IntoResponse {
    event::event_stream(s.engine.subscribe(), s.keep_alive)
}

async fn logs(State(s): State<AppState>) -> Json<Value> {
    let snapshot = s.engine.snapshot();
    Json(json!({
        "transactions": snapshot.transactions,
        "excludedPatterns": snapshot.excluded_patterns,
    }))
}

async fn logcat_lines(State(s): State<AppState>) -> Json<Value> {
    Json(json!({ "lines": s.engine.lines() }))
}

async fn logcat_filter(State(s): State<AppState>) -> Json<Value> {
    let pids = s.pids.lock().clone();
    Json(json!({ "pids": pids, "level": current_params(&s).level }))
}

async fn config(State(s): State<AppState>) -> Json<Value> {
    Json(json!({
        "logcatMaxLines": s.engine.max_lines(),
        "source": s.source(),
    }))
}

async fn set_filter(
    State(s): State<AppState>,
    body: Result<Json<CommandBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&s, "logcat/filter", body).await
}

async fn set_level(
    State(s): State<AppState>,
    body: Result<Json<CommandBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&s, "logcat/level", body).await
}

async fn clear_logcat(State(s): State<AppState>) -> Result<Json<Value>, ApiError> {
    execute_command(&s, Command::ClearLogcat).await.map(Json)
}

async fn clear_logs(State(s): State<AppState>) -> Result<Json<Value>, ApiError> {
    execute_command(&s, Command::ClearLogs).await.map(Json)
}

async fn exclude(
    State(s): State<AppState>,
    body: Result<Json<CommandBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&s, "exclude", body).await
}

async fn include(
    State(s): State<AppState>,
    body: Result<Json<CommandBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&s, "include", body).await
}

async fn run(
    s: &AppState,
    action: &str,
    body: Result<Json<CommandBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let cmd = Command::parse(action, body)?;
    execute_command(s, cmd).await.map(Json)
}
