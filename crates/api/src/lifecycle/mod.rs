//! Process lifecycle: startup, shutdown triggers, and the ordered drain.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open store → Spawn sweeper → Bind listener → Install triggers → Running
//!
//! Triggers (signals.rs):
//!     SIGTERM / SIGINT / panic / failed background task → ShutdownTrigger
//!
//! Shutdown (controller.rs):
//!     First trigger → Draining → close listener (in-flight requests finish)
//!         → stop background tasks → close store → Stopped
//!     Later triggers → ignored
//! ```
//!
//! The whole drain runs under one deadline. Missing it is a forced exit with
//! a non-zero status.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub mod controller;
pub mod listener;
pub mod signals;
pub mod startup;

pub use controller::Controller;
pub use listener::ListenerHandle;
pub use signals::{TriggerSender, Triggers};

/// Where the process is in its lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Starting = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl LifecycleState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifecycleState::Starting,
            1 => LifecycleState::Running,
            2 => LifecycleState::Draining,
            _ => LifecycleState::Stopped,
        }
    }
}

/// What asked the process to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// SIGTERM.
    Terminate,
    /// SIGINT / Ctrl-C.
    Interrupt,
    /// A panic anywhere in the process.
    UncaughtFault(String),
    /// A supervised background task failed or panicked.
    UnhandledAsyncFault(String),
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Terminate => f.write_str("SIGTERM"),
            ShutdownTrigger::Interrupt => f.write_str("SIGINT"),
            ShutdownTrigger::UncaughtFault(msg) => write!(f, "uncaught fault: {msg}"),
            ShutdownTrigger::UnhandledAsyncFault(msg) => write!(f, "unhandled async fault: {msg}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The drain did not finish within the configured budget.
    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    /// Shutdown was already in progress or done; the trigger was ignored.
    #[error("shutdown already in progress")]
    DuplicateShutdown,

    /// A teardown step failed; later steps were not run.
    #[error("shutdown step `{step}` failed: {reason}")]
    Teardown { step: &'static str, reason: String },
}

impl LifecycleError {
    /// Process exit status for a shutdown that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::DuplicateShutdown => 0,
            LifecycleError::ShutdownTimeout(_) | LifecycleError::Teardown { .. } => 1,
        }
    }
}

/// Exit status for the outcome of [`Controller::run`].
pub fn exit_code(outcome: &Result<(), LifecycleError>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(err) => err.exit_code(),
    }
}
