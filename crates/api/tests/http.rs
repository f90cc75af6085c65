//! End-to-end HTTP behaviour through the full router.

use std::sync::{Arc, Mutex};

use api::config::{Config, RuntimeMode};
use api::server::{router, state::AppState};
use api::session::store::MemoryStore;
use api::telemetry::{Event, EventSink};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::Value;

#[derive(Default)]
struct Events(Mutex<Vec<Event>>);

impl EventSink for Events {
    fn emit(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

impl Events {
    fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

fn config(mode: RuntimeMode) -> Config {
    Config {
        app_env: mode,
        allowed_origins: "https://known-app.example,http://localhost:3000".into(),
        ..Config::with_required("integration-test-session-secret", "memory://")
    }
}

fn server_with(cfg: Config) -> (TestServer, Arc<Events>) {
    let events = Arc::new(Events::default());
    let state = AppState::new(&cfg, Arc::new(MemoryStore::new()), events.clone());
    (TestServer::new(router::build(state)).unwrap(), events)
}

fn server(mode: RuntimeMode) -> (TestServer, Arc<Events>) {
    server_with(config(mode))
}

fn session_cookie(resp: &TestResponse) -> String {
    let raw = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("response sets the session cookie")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_owned()
}

fn value(s: &str) -> HeaderValue {
    HeaderValue::from_str(s).unwrap()
}

fn forwarded_https() -> (HeaderName, HeaderValue) {
    (HeaderName::from_static("x-forwarded-proto"), HeaderValue::from_static("https"))
}

#[tokio::test]
async fn health_reports_ok() {
    let (server, _) = server(RuntimeMode::Development);
    let resp = server.get("/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["environment"], "development");
    assert_eq!(body["session"]["store"], "memory");
}

#[tokio::test]
async fn session_counter_survives_between_requests() {
    let (server, _) = server(RuntimeMode::Development);

    let first = server.get("/api/test-session").await;
    first.assert_status_ok();
    let cookie = session_cookie(&first);
    let body: Value = first.json();
    assert_eq!(body["views"], 1);
    let id = body["sessionID"].as_str().unwrap().to_owned();

    let second = server
        .get("/api/test-session")
        .add_header(header::COOKIE, value(&cookie))
        .await;
    let body: Value = second.json();
    assert_eq!(body["views"], 2);
    assert_eq!(body["sessionID"], id);
}

#[tokio::test]
async fn forged_cookie_gets_a_new_session() {
    let (server, _) = server(RuntimeMode::Development);
    let resp = server
        .get("/api/test-session")
        .add_header(header::COOKIE, value("matchday.sid=s:attacker-chosen-id.bm90LWEtc2lnbmF0dXJl"))
        .await;
    let body: Value = resp.json();
    assert_eq!(body["views"], 1);
    assert_ne!(body["sessionID"], "attacker-chosen-id");
}

#[tokio::test]
async fn production_cookie_attributes_behind_tls_proxy() {
    let (server, _) = server(RuntimeMode::Production);
    let (name, proto) = forwarded_https();
    let resp = server
        .get("/api/test-session")
        .add_header(name, proto)
        .await;
    resp.assert_status_ok();
    let raw = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_owned();
    assert!(raw.starts_with("matchday.sid=s:"));
    assert!(raw.contains("; HttpOnly"));
    assert!(raw.contains("; Secure"));
    assert!(raw.contains("; SameSite=None"));
    assert!(raw.contains("; Max-Age=604800"));

    let body: Value = resp.json();
    assert_eq!(body["cookie"]["secure"], true);
    assert_eq!(body["cookie"]["sameSite"], "none");
}

#[tokio::test]
async fn production_withholds_secure_cookie_over_plain_http() {
    let (server, events) = server(RuntimeMode::Production);
    let resp = server.get("/api/test-session").await;
    resp.assert_status_ok();
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(events.count(|e| *e == Event::InsecureCookieWithheld), 1);
}

#[tokio::test]
async fn listed_origin_is_served_with_credentials() {
    let (server, _) = server(RuntimeMode::Production);
    let (name, proto) = forwarded_https();
    let resp = server
        .get("/api/test-session")
        .add_header(header::ORIGIN, value("https://known-app.example"))
        .add_header(name, proto)
        .await;
    resp.assert_status_ok();
    let h = resp.headers();
    assert_eq!(h[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://known-app.example");
    assert_eq!(h[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert!(h.get(header::SET_COOKIE).is_some());
}

#[tokio::test]
async fn unknown_origin_is_refused_in_production() {
    let (server, events) = server(RuntimeMode::Production);
    let resp = server
        .get("/api/test-session")
        .add_header(header::ORIGIN, value("https://evil.example"))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
    assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    let body: Value = resp.json();
    assert_eq!(body["code"], "cors_rejected");
    assert_eq!(
        events.count(|e| matches!(e, Event::OriginRejected { origin } if origin == "https://evil.example")),
        1
    );
}

#[tokio::test]
async fn unknown_origin_is_allowed_with_warning_in_development() {
    let (server, events) = server(RuntimeMode::Development);
    let resp = server
        .get("/health")
        .add_header(header::ORIGIN, value("https://evil.example"))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://evil.example");
    assert_eq!(events.count(|e| matches!(e, Event::OriginBypassed { .. })), 1);
}

#[tokio::test]
async fn debug_endpoint_only_exists_when_enabled() {
    let (server, _) = server(RuntimeMode::Development);
    server.get("/api/debug/me").await.assert_status(StatusCode::NOT_FOUND);

    let (server, _) = server_with(Config {
        diagnostics_enabled: true,
        ..config(RuntimeMode::Development)
    });
    let first = server.get("/api/test-session").await;
    let cookie = session_cookie(&first);

    let resp = server
        .get("/api/debug/me")
        .add_header(header::COOKIE, value(&cookie))
        .add_header(header::ORIGIN, value("http://localhost:3000"))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["hasSession"], true);
    assert_eq!(body["session"]["views"], 1);
    assert_eq!(body["headers"]["origin"], "http://localhost:3000");
    assert_eq!(body["headers"]["cookie"], cookie);
}

#[tokio::test]
async fn root_lists_endpoints_and_session() {
    let (server, _) = server(RuntimeMode::Development);
    let resp = server.get("/").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["environment"], "development");
    assert_eq!(body["endpoints"]["testSession"], "/api/test-session");
    assert_eq!(body["session"]["loggedIn"], false);
}

#[tokio::test]
async fn unknown_path_is_json_404() {
    let (server, _) = server(RuntimeMode::Development);
    let resp = server.get("/nope").await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: Value = resp.json();
    assert_eq!(body["code"], "not_found");
}
