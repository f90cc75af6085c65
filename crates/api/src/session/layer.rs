//! Session middleware: resolves the cookie to a record before the handler and
//! persists the outcome after it.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{field, warn, Span};

use super::cookie;
use super::forwarded::Forwarded;
use super::handle::{Session, Snapshot, Unavailable};
use super::policy::COOKIE_NAME;
use super::record::{now_ms, SessionRecord};
use super::store::StoreError;
use crate::crypto::signing;
use crate::server::state::AppState;
use crate::telemetry::Event;

/// Attach a [`Session`] to the request.
///
/// A cookie with a bad signature, or naming a record that is gone, yields a
/// fresh session. If the store cannot be reached the request is still served,
/// without a session, and handlers extracting [`Session`] answer `503`.
pub async fn attach(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let forwarded = Forwarded::derive(req.headers(), peer, state.sessions.trust_proxy_hops);
    if let Some(ip) = forwarded.client_ip {
        Span::current().record("client_ip", field::display(ip));
    }
    req.extensions_mut().insert(forwarded);

    let presented = cookie::read(req.headers(), COOKIE_NAME)
        .and_then(|value| signing::unsign(value, &state.sessions.keys.signing))
        .map(str::to_owned);

    let session = match resolve(&state, presented.as_deref()).await {
        Ok(session) => session,
        Err(err) => {
            state.events.emit(Event::SessionStoreUnavailable {
                operation: "load",
                reason: err.to_string(),
            });
            req.extensions_mut().insert(Unavailable(err.to_string()));
            return next.run(req).await;
        }
    };

    req.extensions_mut().insert(session.clone());
    let mut response = next.run(req).await;
    commit(&state, session.snapshot(), forwarded, &mut response).await;
    response
}

async fn resolve(state: &AppState, presented: Option<&str>) -> Result<Session, StoreError> {
    if let Some(id) = presented {
        if let Some(record) = state.store.load(id).await? {
            return Ok(Session::loaded(record));
        }
    }
    let policy = &state.sessions;
    Ok(Session::fresh(SessionRecord::mint(
        policy.cookie.clone(),
        now_ms(),
        policy.ttl,
    )))
}

/// Persist the session and decide whether the response carries a cookie.
async fn commit(state: &AppState, snapshot: Snapshot, forwarded: Forwarded, response: &mut Response) {
    let policy = &state.sessions;
    let Snapshot {
        mut record,
        is_new,
        modified,
    } = snapshot;
    let now = now_ms();

    let persist = modified
        || if is_new {
            policy.save_uninitialized
        } else {
            policy.resave
        };
    let due_for_touch =
        !is_new && now.saturating_sub(record.last_touch_ms) >= policy.touch_interval.as_millis() as u64;

    let written = if persist {
        record.touch(now, policy.ttl);
        state.store.save(&record).await.map_err(|e| ("save", e))
    } else if due_for_touch {
        record.touch(now, policy.ttl);
        state
            .store
            .touch(&record.id, record.last_touch_ms, record.expires_at_ms)
            .await
            .map_err(|e| ("touch", e))
    } else {
        Ok(())
    };

    if let Err((operation, err)) = written {
        state.events.emit(Event::SessionStoreUnavailable {
            operation,
            reason: err.to_string(),
        });
        // A cookie for a record that never reached the store would dangle.
        if is_new {
            return;
        }
    }

    let send_cookie = if is_new { persist } else { policy.rolling || modified };
    if !send_cookie {
        return;
    }
    if policy.cookie.secure && !forwarded.secure {
        state.events.emit(Event::InsecureCookieWithheld);
        return;
    }

    let value = signing::sign(&record.id, &policy.keys.signing);
    match cookie::render(COOKIE_NAME, &value, &policy.cookie) {
        Ok(header_value) => {
            response.headers_mut().append(header::SET_COOKIE, header_value);
        }
        Err(err) => warn!(error = %err, "session cookie could not be rendered"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, RuntimeMode};
    use crate::session::policy::SessionPolicy;
    use crate::session::record::fields;
    use crate::session::store::{MemoryStore, SessionStore};
    use crate::telemetry::events::testing::RecordingSink;

    /// Store whose every operation fails.
    struct DownStore;

    #[async_trait]
    impl SessionStore for DownStore {
        fn kind(&self) -> &'static str {
            "down"
        }
        async fn load(&self, _: &str) -> Result<Option<SessionRecord>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn save(&self, _: &SessionRecord) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn touch(&self, _: &str, _: u64, _: u64) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn destroy(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn clear_expired(&self, _: u64) -> Result<usize, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
        async fn close(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Memory store that counts writes.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        saves: AtomicUsize,
        touches: AtomicUsize,
    }

    impl CountingStore {
        fn writes(&self) -> (usize, usize) {
            (self.saves.load(Ordering::SeqCst), self.touches.load(Ordering::SeqCst))
        }
    }

    #[async_trait]
    impl SessionStore for CountingStore {
        fn kind(&self) -> &'static str {
            "counting"
        }
        async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
            self.inner.load(id).await
        }
        async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(record).await
        }
        async fn touch(&self, id: &str, last_touch_ms: u64, expires_at_ms: u64) -> Result<(), StoreError> {
            self.touches.fetch_add(1, Ordering::SeqCst);
            self.inner.touch(id, last_touch_ms, expires_at_ms).await
        }
        async fn destroy(&self, id: &str) -> Result<(), StoreError> {
            self.inner.destroy(id).await
        }
        async fn clear_expired(&self, now_ms: u64) -> Result<usize, StoreError> {
            self.inner.clear_expired(now_ms).await
        }
        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
        async fn close(&self) -> Result<(), StoreError> {
            self.inner.close().await
        }
    }

    fn state(mode: RuntimeMode, store: Arc<dyn SessionStore>, events: Arc<RecordingSink>) -> AppState {
        let cfg = Config {
            app_env: mode,
            ..Config::with_required("0123456789abcdef0123", "memory://")
        };
        AppState {
            mode,
            sessions: Arc::new(SessionPolicy::from_config(&cfg)),
            store,
            events,
            ..AppState::default()
        }
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route(
                "/count",
                get(|session: Session| async move {
                    let views = session.get::<u64>(fields::VIEWS).unwrap_or(0) + 1;
                    session.insert(fields::VIEWS, views).unwrap();
                    views.to_string()
                }),
            )
            .route(
                "/peek",
                get(|session: Option<Session>| async move {
                    match session {
                        Some(_) => "session",
                        None => "none",
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(state.clone(), attach))
            .with_state(state)
    }

    fn get_with(uri: &str, cookie: Option<&str>, https: bool) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if https {
            builder = builder.header("x-forwarded-proto", "https");
        }
        builder.body(Body::empty()).unwrap()
    }

    fn set_cookie(resp: &Response) -> Option<String> {
        resp.headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().split(';').next().unwrap().to_owned())
    }

    async fn body(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn written_session_roundtrips_through_cookie() {
        let store = Arc::new(MemoryStore::new());
        let app = app(state(RuntimeMode::Development, store.clone(), Default::default()));

        let first = app.clone().oneshot(get_with("/count", None, false)).await.unwrap();
        let cookie = set_cookie(&first).expect("new written session gets a cookie");
        assert!(cookie.starts_with("matchday.sid=s:"));
        assert_eq!(body(first).await, "1");

        let second = app.oneshot(get_with("/count", Some(&cookie), false)).await.unwrap();
        assert_eq!(body(second).await, "2");
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn untouched_new_session_is_neither_saved_nor_sent() {
        let store = Arc::new(MemoryStore::new());
        let app = app(state(RuntimeMode::Development, store.clone(), Default::default()));
        let resp = app.oneshot(get_with("/peek", None, false)).await.unwrap();
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test]
    async fn tampered_cookie_starts_a_fresh_session() {
        let store = Arc::new(MemoryStore::new());
        let app = app(state(RuntimeMode::Development, store.clone(), Default::default()));

        let first = app.clone().oneshot(get_with("/count", None, false)).await.unwrap();
        let cookie = set_cookie(&first).unwrap();
        let tampered = cookie.replacen("s:", "s:0", 1);

        let resp = app.oneshot(get_with("/count", Some(&tampered), false)).await.unwrap();
        assert_ne!(set_cookie(&resp).unwrap(), cookie);
        assert_eq!(body(resp).await, "1");
    }

    #[tokio::test]
    async fn existing_session_cookie_rolls_on_read() {
        let store = Arc::new(MemoryStore::new());
        let app = app(state(RuntimeMode::Development, store, Default::default()));
        let first = app.clone().oneshot(get_with("/count", None, false)).await.unwrap();
        let cookie = set_cookie(&first).unwrap();

        let resp = app.oneshot(get_with("/peek", Some(&cookie), false)).await.unwrap();
        assert_eq!(set_cookie(&resp), Some(cookie));
    }

    #[tokio::test]
    async fn secure_cookie_needs_https_as_seen_through_the_proxy() {
        let events = Arc::new(RecordingSink::default());
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let app = app(state(RuntimeMode::Production, store, events.clone()));

        let plain = app.clone().oneshot(get_with("/count", None, false)).await.unwrap();
        assert!(plain.headers().get(header::SET_COOKIE).is_none());
        assert!(events.events().contains(&Event::InsecureCookieWithheld));

        let tls = app.oneshot(get_with("/count", None, true)).await.unwrap();
        let raw = tls.headers()[header::SET_COOKIE].to_str().unwrap().to_owned();
        assert!(raw.contains("; Secure"));
        assert!(raw.contains("SameSite=None"));
    }

    #[tokio::test]
    async fn unreachable_store_degrades_instead_of_failing() {
        let events = Arc::new(RecordingSink::default());
        let app = app(state(RuntimeMode::Development, Arc::new(DownStore), events.clone()));
        let st = state(RuntimeMode::Development, Arc::new(MemoryStore::new()), Default::default());
        let cookie = format!("matchday.sid={}", signing::sign("abc", &st.sessions.keys.signing));

        let peek = app.clone().oneshot(get_with("/peek", Some(&cookie), false)).await.unwrap();
        assert_eq!(peek.status(), StatusCode::OK);
        assert_eq!(body(peek).await, "none");

        let count = app.oneshot(get_with("/count", Some(&cookie), false)).await.unwrap();
        assert_eq!(count.status(), StatusCode::SERVICE_UNAVAILABLE);

        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::SessionStoreUnavailable { operation: "load", .. })));
    }

    #[tokio::test]
    async fn failed_save_withholds_cookie_for_new_session() {
        let events = Arc::new(RecordingSink::default());
        let app = app(state(RuntimeMode::Development, Arc::new(DownStore), events.clone()));
        let resp = app.oneshot(get_with("/count", None, false)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::SessionStoreUnavailable { operation: "save", .. })));
    }

    #[tokio::test]
    async fn stale_record_is_touched_on_read() {
        let store = Arc::new(MemoryStore::new());
        let st = state(RuntimeMode::Development, store.clone(), Default::default());
        let two_days_ago = now_ms() - 2 * 86_400_000;
        let mut record = SessionRecord::mint(st.sessions.cookie.clone(), two_days_ago, Duration::from_secs(14 * 86_400));
        record.data.insert(fields::VIEWS.into(), 1.into());
        store.save(&record).await.unwrap();
        let cookie = format!("matchday.sid={}", signing::sign(&record.id, &st.sessions.keys.signing));

        let resp = app(st).oneshot(get_with("/peek", Some(&cookie), false)).await.unwrap();
        assert_eq!(body(resp).await, "session");
        let after = store.load(&record.id).await.unwrap().unwrap();
        assert!(after.expires_at_ms > record.expires_at_ms);
        assert_eq!(after.data, record.data);
    }

    #[tokio::test]
    async fn recently_touched_record_is_not_written_on_read() {
        let store = Arc::new(CountingStore::default());
        let st = state(RuntimeMode::Development, store.clone(), Default::default());
        let hour_ago = now_ms() - 3_600_000;
        let mut record = SessionRecord::mint(st.sessions.cookie.clone(), hour_ago, Duration::from_secs(14 * 86_400));
        record.data.insert(fields::VIEWS.into(), 3.into());
        store.inner.save(&record).await.unwrap();
        let cookie = format!("matchday.sid={}", signing::sign(&record.id, &st.sessions.keys.signing));

        let resp = app(st).oneshot(get_with("/peek", Some(&cookie), false)).await.unwrap();
        // Rolling still refreshes the browser's cookie.
        assert!(resp.headers().get(header::SET_COOKIE).is_some());
        assert_eq!(body(resp).await, "session");

        assert_eq!(store.writes(), (0, 0));
        let after = store.load(&record.id).await.unwrap().unwrap();
        assert_eq!(after.last_touch_ms, record.last_touch_ms);
        assert_eq!(after.expires_at_ms, record.expires_at_ms);
    }
}
