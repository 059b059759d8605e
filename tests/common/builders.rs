//! Test builders: ergonomic constructors for trace block text and engines.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use std::sync::Arc;
use tracer_core::config::Config;
use tracer_core::parser::{BLOCK_CLOSE, REQUEST_OPEN, RESPONSE_OPEN};
use tracer_core::{Engine, TracePipeline};

// ---------------------------------------------------------------------------
// Block builders
// ---------------------------------------------------------------------------

/// Fluent builder for a `===== REQUEST =====` block.
///
/// # Example
///
/// ```rust
/// let text = RequestBlock::new("POST", "http://api.test/login")
///     .header("Content-Type", "application/json")
///     .body(r#"{"user":"a"}"#)
///     .build();
/// ```
pub struct RequestBlock {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl RequestBlock {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(&self) -> String {
        let first = format!("{} {}", self.method, self.url);
        render(REQUEST_OPEN, &first, &self.headers, self.body.as_deref())
    }
}

/// Fluent builder for a `===== RESPONSE =====` block.
pub struct ResponseBlock {
    status: String,
    note: Option<String>,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl ResponseBlock {
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            note: None,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn ok(url: impl Into<String>) -> Self {
        Self::new(200, url)
    }

    /// Free text between the status and `URL:`, e.g. `OK (35ms)`.
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(&self) -> String {
        let first = match &self.note {
            Some(note) => format!("{} {} URL: {}", self.status, note, self.url),
            None => format!("{} URL: {}", self.status, self.url),
        };
        render(RESPONSE_OPEN, &first, &self.headers, self.body.as_deref())
    }
}

fn render(open: &str, first: &str, headers: &[(String, String)], body: Option<&str>) -> String {
    let mut out = format!("{open}\n{first}\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\n"));
    }
    if let Some(body) = body {
        out.push_str(&format!("Body: {body}\n"));
    }
    out.push_str(BLOCK_CLOSE);
    out.push('\n');
    out
}

/// A matching request/response pair for `url` with empty bodies.
pub fn pair(url: &str) -> String {
    format!("{}{}", RequestBlock::get(url).build(), ResponseBlock::ok(url).build())
}

// ---------------------------------------------------------------------------
// Engine builders
// ---------------------------------------------------------------------------

pub fn engine() -> Arc<Engine> {
    Arc::new(Engine::new(&Config::defaults()))
}

pub fn engine_with(configure: impl FnOnce(&mut Config)) -> Arc<Engine> {
    let mut config = Config::defaults();
    configure(&mut config);
    Arc::new(Engine::new(&config))
}

pub fn pipeline() -> (Arc<Engine>, TracePipeline) {
    let engine = engine();
    let pipeline = TracePipeline::new(Arc::clone(&engine));
    (engine, pipeline)
}
