//! Shared application state injected into every Axum handler and middleware.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, RuntimeMode};
use crate::cors::Allowlist;
use crate::session::{store::MemoryStore, SessionPolicy, SessionStore};
use crate::telemetry::{EventSink, TracingSink};

/// Application state shared across all request handlers.
///
/// Every field is `Copy` or `Arc`-backed, so Axum's per-request clone is cheap.
#[derive(Clone)]
pub struct AppState {
    pub mode: RuntimeMode,
    pub allowlist: Arc<Allowlist>,
    pub sessions: Arc<SessionPolicy>,
    pub store: Arc<dyn SessionStore>,
    pub events: Arc<dyn EventSink>,
    /// Serve `GET /api/debug/me`.
    pub diagnostics_enabled: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(cfg: &Config, store: Arc<dyn SessionStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            mode: cfg.app_env,
            allowlist: Arc::new(cfg.allowlist()),
            sessions: Arc::new(SessionPolicy::from_config(cfg)),
            store,
            events,
            diagnostics_enabled: cfg.diagnostics_enabled,
            started_at: Instant::now(),
        }
    }
}

impl Default for AppState {
    /// Development mode over an in-memory store, suitable for tests.
    fn default() -> Self {
        Self::new(
            &Config::with_required("development-only-session-secret", "memory://"),
            Arc::new(MemoryStore::new()),
            Arc::new(TracingSink),
        )
    }
}
