//! Admission middleware: gates every request on its `Origin` and decorates
//! allowed cross-origin responses.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::ServiceError;

use super::origin::{decide, Decision};
use crate::server::{error::ApiError, state::AppState};
use crate::telemetry::Event;

pub const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-Requested-With, Cookie";
pub const EXPOSED_HEADERS: &str = "Set-Cookie";
pub const PREFLIGHT_MAX_AGE_SECS: &str = "86400";

/// Runs [`decide`] for the request.
///
/// A denied request is answered with `403 cors_rejected` before the inner
/// service sees it, so its body is never read. An allowed preflight is
/// answered here with `204`.
pub async fn admit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let origin = req.headers().get(header::ORIGIN).cloned();
    let origin_str = origin
        .as_ref()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    let decision = decide(
        origin_str.as_deref(),
        &state.allowlist,
        state.mode.is_development(),
        state.events.as_ref(),
    );
    if decision == Decision::Deny {
        let origin = origin_str.unwrap_or_default();
        state.events.emit(Event::OriginRejected {
            origin: origin.clone(),
        });
        return ApiError::from(ServiceError::CorsRejected(origin)).into_response();
    }

    let Some(origin) = origin else {
        return next.run(req).await;
    };

    let preflight = is_preflight(&req);
    let mut response = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    apply_headers(response.headers_mut(), origin, preflight);
    response
}

fn is_preflight(req: &Request) -> bool {
    req.method() == Method::OPTIONS
        && req
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

fn apply_headers(headers: &mut HeaderMap, origin: HeaderValue, preflight: bool) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
    headers.append(header::VARY, HeaderValue::from_static("origin"));
    if preflight {
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS),
        );
    }
}
