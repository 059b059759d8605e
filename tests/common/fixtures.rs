//! Static trace corpora used across harnesses.
//!
//! Each corpus is raw trace-file text, exactly as the interceptor writes it,
//! including the noise that sits between blocks in real captures.

/// The request/response pair used throughout the docs.
pub const WORKED_EXAMPLE: &str = "\
===== REQUEST =====
GET http://api.test/x
Authorization: Bearer t
========================
===== RESPONSE =====
200 URL: http://api.test/x
Content-Type: application/json

Body: {\"ok\":true}
========================
";

/// Interleaved traffic for two hosts, with log noise between blocks and a
/// multi-line JSON body.
pub const INTERLEAVED: &str = "\
I/OkHttp: --> GET http://api.test/users
===== REQUEST =====
GET http://api.test/users
Accept: application/json
========================
===== REQUEST =====
POST http://auth.test/token
Content-Type: application/json

Body: {
  \"grant\": \"password\"
}
========================
D/Choreographer: Skipped 31 frames!
===== RESPONSE =====
201 Created (88ms) URL: http://auth.test/token
Content-Type: application/json
Body: {\"token\":\"abc\"}
========================
===== RESPONSE =====
200 OK (12ms) URL: http://api.test/users
Body: [1, 2, 3]
========================
";

/// A malformed request (no URL), a malformed response (no status line), and
/// a valid pair after them.
pub const MALFORMED_THEN_VALID: &str = "\
===== REQUEST =====
GET
========================
===== RESPONSE =====
this is not a status line
========================
===== REQUEST =====

========================
===== REQUEST =====
DELETE http://api.test/item/9
========================
===== RESPONSE =====
204 URL: http://api.test/item/9
========================
";

/// A response with nothing queued for it.
pub const ORPHAN_RESPONSE: &str = "\
===== RESPONSE =====
500 URL: http://api.test/never-requested
Body: oops
========================
";

/// Device log lines in `threadtime` format.
pub const LOGCAT_LINES: &[&str] = &[
    "10-19 12:00:00.001  1234  1234 I ActivityManager: Start proc 7450:com.example/u0a123",
    "10-19 12:00:00.120  7450  7450 D OkHttp: --> GET http://api.test/users",
    "10-19 12:00:00.245  7450  7480 W System.err: java.net.SocketTimeoutException",
    "10-19 12:00:01.002  7450  7450 E AndroidRuntime: FATAL EXCEPTION: main",
];
