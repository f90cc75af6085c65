//! Logging and tracing setup, plus the event sink decision code reports into.
//!
//! # Telemetry invariants
//!
//! - **No secrets or session contents** appear in any span attribute or log
//!   field. Cookie values and the session secret are never logged.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`), overridden
//!   by `RUST_LOG` when set.

pub mod events;
pub mod init;

pub use events::{Event, EventSink, TracingSink};
pub use init::{init_telemetry, shutdown_telemetry};
