//! Background removal of expired session records.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::record::now_ms;
use super::store::{SessionStore, StoreError};
use crate::telemetry::{Event, EventSink};

/// Spawn the sweep loop. It ends on its own once the store is closed; the
/// shutdown sequence aborts it before closing the store anyway.
pub fn spawn(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    events: Arc<dyn EventSink>,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(run(store, interval, events))
}

async fn run(store: Arc<dyn SessionStore>, interval: Duration, events: Arc<dyn EventSink>) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Skip the immediate first tick.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match store.clear_expired(now_ms()).await {
            Ok(0) => debug!("no expired sessions"),
            Ok(removed) => events.emit(Event::SessionsSwept { removed }),
            Err(StoreError::Closed) => return Ok(()),
            Err(err) => events.emit(Event::SessionStoreUnavailable {
                operation: "clear_expired",
                reason: err.to_string(),
            }),
        }
    }
}
