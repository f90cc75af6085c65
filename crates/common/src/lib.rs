//! Common types, protocol definitions, and errors shared across matchday API crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
