//! HTTP surface: routing, handlers, and shared state.
//!
//! # Responsibilities
//! - Define the Axum router with the service routes and shared middleware.
//! - Inject shared application state (`AppState`) into handlers.
//! - Render [`common::ServiceError`] as JSON error responses.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
