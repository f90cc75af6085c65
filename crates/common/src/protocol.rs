//! JSON bodies returned by the service's diagnostic endpoints.
//!
//! Field names follow the camelCase shape that browser clients and the
//! end-to-end tests expect (`userId`, `loggedIn`, `sessionID`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Root endpoint
// ---------------------------------------------------------------------------

/// Response body for `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub environment: String,
    pub session: SessionOverview,
    /// Route name → path of the resources served by this process.
    pub endpoints: BTreeMap<String, String>,
}

/// Session summary embedded in [`RootResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverview {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub logged_in: bool,
    /// `true` when a session was attached to the request.
    pub configured: bool,
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"OK"` while the process is serving.
    pub status: String,
    /// RFC 3339 timestamp at which the response was produced.
    pub timestamp: String,
    /// Seconds since the process started serving.
    pub uptime: f64,
    pub environment: String,
    pub session: SessionHealth,
}

/// Session section of [`HealthResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHealth {
    pub configured: bool,
    /// Store adapter kind, or `"unavailable"` when it does not answer a ping.
    pub store: String,
    pub user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Session diagnostics
// ---------------------------------------------------------------------------

/// Cookie attributes echoed by the session diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieSettings {
    pub secure: bool,
    pub http_only: bool,
    pub same_site: String,
    /// Client-side max age in milliseconds.
    pub max_age: u64,
    pub path: String,
    pub domain: Option<String>,
}

/// Response body for `GET /api/test-session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSessionResponse {
    pub message: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub views: u64,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub logged_in: bool,
    pub cookie: CookieSettings,
}

/// Request identity headers echoed by `GET /api/debug/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestHeaders {
    pub origin: Option<String>,
    pub referer: Option<String>,
    pub cookie: Option<String>,
}

/// Client identity as derived through the trusted proxy chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip: Option<String>,
    /// Request reached the outermost trusted hop over HTTPS.
    pub secure: bool,
}

/// Response body for `GET /api/debug/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugMeResponse {
    pub has_session: bool,
    #[serde(rename = "sessionID")]
    pub session_id: Option<String>,
    /// Full session contents; `null` when no session is attached.
    pub session: Option<serde_json::Map<String, serde_json::Value>>,
    pub headers: RequestHeaders,
    pub client: ClientInfo,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"cors_rejected"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
