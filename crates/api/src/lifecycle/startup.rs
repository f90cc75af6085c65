//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the session store
//! - Start the expiry sweeper
//! - Bind the listener and begin accepting traffic
//! - Install shutdown triggers
//!
//! Any failure here is fatal. Each resource is handed to the [`Controller`]
//! as soon as it exists, and a failure after the store opened drains
//! whatever did start before the error is returned.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use super::{Controller, ListenerHandle, ShutdownTrigger, Triggers};
use crate::config::Config;
use crate::server::{router, state::AppState};
use crate::session::{store, sweeper, SessionPolicy, SessionStore};
use crate::telemetry::{Event, EventSink};

/// A started service, ready for [`Controller::run`].
pub struct Started {
    pub controller: Controller,
    pub triggers: Triggers,
    pub local_addr: SocketAddr,
}

pub async fn start(cfg: &Config, events: Arc<dyn EventSink>) -> Result<Started> {
    let controller = Controller::new(cfg.shutdown_timeout(), events.clone());
    let mut triggers = Triggers::new();

    // -----------------------------------------------------------------------
    // 1. Session store
    // -----------------------------------------------------------------------
    let keys = SessionPolicy::from_config(cfg).keys;
    let store = store::open(&cfg.session_store_url, &keys)
        .await
        .context("failed to open session store")?;
    events.emit(Event::StoreOpened { kind: store.kind() });
    controller.adopt_store(store.clone());

    match launch(cfg, &controller, &mut triggers, store, events).await {
        Ok(local_addr) => {
            controller.mark_running();
            Ok(Started {
                controller,
                triggers,
                local_addr,
            })
        }
        Err(err) => {
            let fault = ShutdownTrigger::UncaughtFault(format!("startup failed: {err:#}"));
            if let Err(drain) = controller.shutdown(fault).await {
                tracing::error!(error = %drain, "drain after failed startup did not complete");
            }
            Err(err)
        }
    }
}

/// Steps 2 to 4. Everything started here is already owned by `controller`.
async fn launch(
    cfg: &Config,
    controller: &Controller,
    triggers: &mut Triggers,
    store: Arc<dyn SessionStore>,
    events: Arc<dyn EventSink>,
) -> Result<SocketAddr> {
    // -----------------------------------------------------------------------
    // 2. Background tasks
    // -----------------------------------------------------------------------
    let sweep = sweeper::spawn(store.clone(), cfg.sweep_interval(), events.clone());
    let abort = sweep.abort_handle();
    triggers.supervise("session-sweeper", sweep);
    controller.register_background_stop(move || abort.abort());

    // -----------------------------------------------------------------------
    // 3. HTTP listener
    // -----------------------------------------------------------------------
    let state = AppState::new(cfg, store, events.clone());
    state.allowlist.report_unreachable(events.as_ref());
    let listener = TcpListener::bind(cfg.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr()))?;
    let listener = ListenerHandle::serve(listener, router::build(state)).context("failed to start listener")?;
    let local_addr = listener.local_addr();
    events.emit(Event::ListenerBound { addr: local_addr });
    controller.adopt_listener(listener);

    // -----------------------------------------------------------------------
    // 4. Shutdown triggers
    // -----------------------------------------------------------------------
    triggers
        .install_signals()
        .context("failed to install signal handlers")?;
    triggers.install_fault_hook();

    Ok(local_addr)
}
