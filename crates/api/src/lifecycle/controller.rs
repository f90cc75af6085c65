//! Shutdown coordination.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::listener::ListenerHandle;
use super::signals::Triggers;
use super::{LifecycleError, LifecycleState, ShutdownTrigger};
use crate::session::SessionStore;
use crate::telemetry::{Event, EventSink};

type StopFn = Box<dyn FnOnce() + Send>;

/// Resources released by the drain, in this order.
#[derive(Default)]
struct Teardown {
    listener: Option<ListenerHandle>,
    background: Vec<StopFn>,
    store: Option<Arc<dyn SessionStore>>,
}

impl Teardown {
    async fn run(self, events: &dyn EventSink) -> Result<(), LifecycleError> {
        if let Some(listener) = self.listener {
            listener.close().await.map_err(|e| LifecycleError::Teardown {
                step: "listener",
                reason: e.to_string(),
            })?;
            events.emit(Event::ListenerClosed);
        }

        for stop in self.background {
            stop();
            events.emit(Event::BackgroundTaskStopped);
        }

        if let Some(store) = self.store {
            store.close().await.map_err(|e| LifecycleError::Teardown {
                step: "store",
                reason: e.to_string(),
            })?;
            events.emit(Event::StoreClosed);
        }
        Ok(())
    }
}

/// Owns the resources started by [`super::startup::start`] and releases them
/// exactly once.
///
/// The first call to [`Controller::shutdown`] claims the drain; concurrent and
/// later calls return [`LifecycleError::DuplicateShutdown`] immediately
/// without touching any resource.
pub struct Controller {
    state: AtomicU8,
    drain_timeout: Duration,
    events: Arc<dyn EventSink>,
    teardown: Mutex<Teardown>,
}

impl Controller {
    pub fn new(drain_timeout: Duration, events: Arc<dyn EventSink>) -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Starting as u8),
            drain_timeout,
            events,
            teardown: Mutex::new(Teardown::default()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn adopt_listener(&self, listener: ListenerHandle) {
        self.teardown().listener = Some(listener);
    }

    /// Register a synchronous stop action for a background task.
    pub fn register_background_stop(&self, stop: impl FnOnce() + Send + 'static) {
        self.teardown().background.push(Box::new(stop));
    }

    pub fn adopt_store(&self, store: Arc<dyn SessionStore>) {
        self.teardown().store = Some(store);
    }

    /// `Starting` → `Running`. No effect once a shutdown has begun.
    pub fn mark_running(&self) {
        let moved = self
            .state
            .compare_exchange(
                LifecycleState::Starting as u8,
                LifecycleState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if moved {
            self.events.emit(Event::Running);
        }
    }

    /// Drain and release everything, bounded by the drain timeout.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::DuplicateShutdown`] if a shutdown already began
    /// - [`LifecycleError::ShutdownTimeout`] if the drain missed its deadline
    /// - [`LifecycleError::Teardown`] if a step failed
    pub async fn shutdown(&self, trigger: ShutdownTrigger) -> Result<(), LifecycleError> {
        let claimed = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match LifecycleState::from_u8(raw) {
                    LifecycleState::Starting | LifecycleState::Running => Some(LifecycleState::Draining as u8),
                    LifecycleState::Draining | LifecycleState::Stopped => None,
                }
            })
            .is_ok();
        if !claimed {
            self.events.emit(Event::DuplicateShutdown { trigger });
            return Err(LifecycleError::DuplicateShutdown);
        }
        self.events.emit(Event::ShutdownStarted { trigger });

        let teardown = std::mem::take(&mut *self.teardown());
        let outcome = match tokio::time::timeout(self.drain_timeout, teardown.run(self.events.as_ref())).await {
            Ok(Ok(())) => {
                self.events.emit(Event::Stopped);
                Ok(())
            }
            Ok(Err(err)) => {
                if let LifecycleError::Teardown { step, reason } = &err {
                    self.events.emit(Event::TeardownFailed {
                        step: *step,
                        reason: reason.clone(),
                    });
                }
                Err(err)
            }
            Err(_) => {
                self.events.emit(Event::ShutdownTimedOut {
                    after: self.drain_timeout,
                });
                Err(LifecycleError::ShutdownTimeout(self.drain_timeout))
            }
        };
        self.state.store(LifecycleState::Stopped as u8, Ordering::Release);
        outcome
    }

    /// Wait for the first trigger and drain. Triggers that arrive while
    /// draining are reported and otherwise ignored.
    pub async fn run(&self, triggers: &mut Triggers) -> Result<(), LifecycleError> {
        let first = triggers.next().await;
        let drain = self.shutdown(first);
        tokio::pin!(drain);
        loop {
            tokio::select! {
                outcome = &mut drain => return outcome,
                next = triggers.next() => {
                    let _ = self.shutdown(next).await;
                }
            }
        }
    }

    fn teardown(&self) -> std::sync::MutexGuard<'_, Teardown> {
        self.teardown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
