//! Constants for the tower layers applied in [`super::router::build`].

use std::time::Duration;

/// Per-request timeout applied to all routes.
///
/// This is longer than the default `SHUTDOWN_TIMEOUT_SECS` (10 s). During a
/// drain a stuck handler is cut off by the drain deadline, which exits with
/// status 1, not by this timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
