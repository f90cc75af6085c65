//! Common error types shared across crates.

use thiserror::Error;

/// Request-scoped service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::CorsRejected`] → 403
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::Internal`] → 500
/// - [`ServiceError::SessionStoreUnavailable`] → 503
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request's `Origin` is not on the allowlist and the service is not
    /// running in development mode. The request body is never processed.
    #[error("origin not allowed: {0}")]
    CorsRejected(String),

    /// The session store could not be reached, so the request has no session.
    #[error("session store unavailable: {0}")]
    SessionStoreUnavailable(String),

    /// No route matched the request path.
    #[error("not found: {0}")]
    NotFound(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::CorsRejected(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Internal(_) => 500,
            ServiceError::SessionStoreUnavailable(_) => 503,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::CorsRejected(_) => "cors_rejected",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Internal(_) => "internal_error",
            ServiceError::SessionStoreUnavailable(_) => "session_store_unavailable",
        }
    }
}
