//! Axum router construction.

use axum::{body::Body, http::Request, middleware::from_fn_with_state, routing::get, Router};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{field, info_span, Span};

use super::{handlers, middleware, state::AppState};
use crate::{cors, session};

/// Build the application [`Router`] with all routes and middleware attached.
///
/// Requests pass the tower layers first, then origin admission, then
/// session attachment, then the route. A rejected origin never reaches the
/// session store.
pub fn build(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(handlers::TEST_SESSION_PATH, get(handlers::test_session));
    if state.diagnostics_enabled {
        router = router.route(handlers::DEBUG_ME_PATH, get(handlers::debug_me));
    }

    router
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), session::layer::attach))
        .layer(from_fn_with_state(state.clone(), cors::layer::admit))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// `client_ip` is filled in by the session layer once forwarding headers
/// have been evaluated.
fn request_span(req: &Request<Body>) -> Span {
    info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        version = ?req.version(),
        client_ip = field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = build(AppState::default());
        let req = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn health_route_exists() {
        let app = build(AppState::default());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn debug_route_follows_diagnostics_flag() {
        let req = || Request::builder().uri("/api/debug/me").body(Body::empty()).unwrap();

        let off = build(AppState::default()).oneshot(req()).await.unwrap();
        assert_eq!(off.status(), 404);

        let state = AppState {
            diagnostics_enabled: true,
            ..AppState::default()
        };
        let on = build(state).oneshot(req()).await.unwrap();
        assert_eq!(on.status(), 200);
    }

    #[tokio::test]
    async fn rejected_origin_skips_the_session_store() {
        let state = AppState {
            mode: crate::config::RuntimeMode::Production,
            ..AppState::default()
        };
        let req = Request::builder()
            .uri("/api/test-session")
            .header("origin", "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let resp = build(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 403);
        assert!(resp.headers().get("set-cookie").is_none());
    }
}
