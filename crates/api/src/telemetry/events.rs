//! Structured event sink consumed by the admission layer, the session layer,
//! and the lifecycle controller.
//!
//! Decision logic never calls `tracing` directly; it emits an [`Event`] into an
//! injected [`EventSink`]. Production wires [`TracingSink`], tests wire a mock
//! or a recorder and assert on the events themselves.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::lifecycle::ShutdownTrigger;

/// Something worth recording that happened during admission, session handling
/// or the process lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// An allowlist entry carries a path and can never equal an `Origin` header.
    AllowlistEntryUnreachable { entry: String },
    /// Unknown origin let through because the service runs in development mode.
    OriginBypassed { origin: String },
    /// Unknown origin refused in production mode.
    OriginRejected { origin: String },
    /// A store operation failed; the request continues without persistence.
    SessionStoreUnavailable { operation: &'static str, reason: String },
    /// A `Secure` cookie was not sent because the request arrived over plain HTTP.
    InsecureCookieWithheld,
    /// The sweeper removed expired records.
    SessionsSwept { removed: usize },
    StoreOpened { kind: &'static str },
    ListenerBound { addr: SocketAddr },
    Running,
    ShutdownStarted { trigger: ShutdownTrigger },
    /// A trigger arrived while the controller was already draining or stopped.
    DuplicateShutdown { trigger: ShutdownTrigger },
    ListenerClosed,
    BackgroundTaskStopped,
    StoreClosed,
    Stopped,
    ShutdownTimedOut { after: Duration },
    TeardownFailed { step: &'static str, reason: String },
}

/// Destination for [`Event`]s.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Maps events onto `tracing` records at the appropriate level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        match event {
            Event::AllowlistEntryUnreachable { entry } => {
                warn!(entry = %entry, "allowlist entry can never match an Origin header")
            }
            Event::OriginBypassed { origin } => {
                warn!(origin = %origin, "origin not in allowlist; allowed in development mode")
            }
            Event::OriginRejected { origin } => {
                warn!(origin = %origin, "origin not in allowlist; request rejected")
            }
            Event::SessionStoreUnavailable { operation, reason } => {
                error!(operation, reason = %reason, "session store unavailable; continuing without session persistence")
            }
            Event::InsecureCookieWithheld => {
                warn!("secure session cookie withheld from a plain-HTTP request; check TRUST_PROXY_HOPS")
            }
            Event::SessionsSwept { removed } => info!(removed, "expired sessions swept"),
            Event::StoreOpened { kind } => info!(kind, "session store opened"),
            Event::ListenerBound { addr } => info!(addr = %addr, "listening"),
            Event::Running => info!("server running"),
            Event::ShutdownStarted { trigger } => {
                info!(trigger = %trigger, "shutdown started; draining connections")
            }
            Event::DuplicateShutdown { trigger } => {
                warn!(trigger = %trigger, "shutdown already in progress; ignoring trigger")
            }
            Event::ListenerClosed => info!("listener closed; in-flight connections drained"),
            Event::BackgroundTaskStopped => info!("background task stopped"),
            Event::StoreClosed => info!("session store closed"),
            Event::Stopped => info!("shutdown complete"),
            Event::ShutdownTimedOut { after } => {
                error!(timeout_ms = after.as_millis() as u64, "graceful shutdown timed out; forcing exit")
            }
            Event::TeardownFailed { step, reason } => {
                error!(step, reason = %reason, "shutdown step failed")
            }
        }
    }
}
