//! Axum request handlers for the service's own endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, Uri},
    Extension, Json,
};
use common::protocol::{
    ClientInfo, CookieSettings, DebugMeResponse, HealthResponse, RequestHeaders, RootResponse, SessionHealth,
    SessionOverview, TestSessionResponse,
};
use common::ServiceError;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::warn;

use super::{error::ApiError, state::AppState};
use crate::session::{fields, CookieAttributes, Forwarded, Session};

pub const TEST_SESSION_PATH: &str = "/api/test-session";
pub const DEBUG_ME_PATH: &str = "/api/debug/me";

/// `GET /`: service identity, the caller's session summary, and the routes
/// this process serves.
pub async fn root(State(state): State<AppState>, session: Option<Session>) -> Json<RootResponse> {
    let mut endpoints = BTreeMap::from([
        ("health".to_owned(), "/health".to_owned()),
        ("testSession".to_owned(), TEST_SESSION_PATH.to_owned()),
    ]);
    if state.diagnostics_enabled {
        endpoints.insert("debugMe".to_owned(), DEBUG_ME_PATH.to_owned());
    }

    Json(RootResponse {
        message: "Matchday API is running".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        environment: state.mode.to_string(),
        session: SessionOverview {
            id: session.as_ref().map(Session::id),
            user_id: session.as_ref().and_then(Session::user_id),
            logged_in: session.as_ref().is_some_and(Session::is_logged_in),
            configured: session.is_some(),
        },
        endpoints,
    })
}

/// `GET /health`: liveness. Always `200` while serving; a store that does
/// not answer its ping is reported, not escalated.
pub async fn health(State(state): State<AppState>, session: Option<Session>) -> Json<HealthResponse> {
    let store = match state.store.ping().await {
        Ok(()) => state.store.kind().to_owned(),
        Err(err) => {
            warn!(error = %err, "session store ping failed");
            "unavailable".to_owned()
        }
    };

    Json(HealthResponse {
        status: "OK".into(),
        timestamp: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        environment: state.mode.to_string(),
        session: SessionHealth {
            configured: session.is_some(),
            store,
            user_id: session.as_ref().and_then(Session::user_id),
        },
    })
}

/// `GET /api/test-session`: bump the view counter and echo the session.
pub async fn test_session(State(state): State<AppState>, session: Session) -> Result<Json<TestSessionResponse>, ApiError> {
    let views = session.get::<u64>(fields::VIEWS).unwrap_or(0) + 1;
    session
        .insert(fields::VIEWS, views)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    Ok(Json(TestSessionResponse {
        message: "Session is working".into(),
        session_id: session.id(),
        views,
        user_id: session.user_id(),
        username: session.get(fields::USERNAME),
        email: session.get(fields::EMAIL),
        logged_in: session.is_logged_in(),
        cookie: cookie_settings(&state.sessions.cookie),
    }))
}

/// `GET /api/debug/me`: echo the session and the request's identity headers.
/// Only routed when diagnostics are enabled.
pub async fn debug_me(
    session: Option<Session>,
    forwarded: Option<Extension<Forwarded>>,
    headers: HeaderMap,
) -> Json<DebugMeResponse> {
    let Extension(forwarded) = forwarded.unwrap_or_default();
    Json(DebugMeResponse {
        has_session: session.is_some(),
        session_id: session.as_ref().map(Session::id),
        session: session.as_ref().map(Session::data),
        headers: RequestHeaders {
            origin: header_str(&headers, &header::ORIGIN),
            referer: header_str(&headers, &header::REFERER),
            cookie: header_str(&headers, &header::COOKIE),
        },
        client: ClientInfo {
            ip: forwarded.client_ip.map(|ip| ip.to_string()),
            secure: forwarded.secure,
        },
    })
}

/// Catch-all 404 handler.
pub async fn not_found(uri: Uri) -> ApiError {
    ServiceError::NotFound(uri.path().to_owned()).into()
}

fn cookie_settings(attrs: &CookieAttributes) -> CookieSettings {
    CookieSettings {
        secure: attrs.secure,
        http_only: attrs.http_only,
        same_site: attrs.same_site.as_str().to_owned(),
        max_age: attrs.max_age_secs.saturating_mul(1000),
        path: attrs.path.clone(),
        domain: attrs.domain.clone(),
    }
}

fn header_str(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}
