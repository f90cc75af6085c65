//! matchday API service.
//!
//! Admits browser traffic by `Origin`, attaches cookie-backed server-side
//! sessions, and runs the process lifecycle from startup to an ordered,
//! time-bounded shutdown.

pub mod config;
pub mod cors;
pub mod crypto;
pub mod lifecycle;
pub mod server;
pub mod session;
pub mod telemetry;
