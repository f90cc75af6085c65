//! Cookie-backed server-side sessions.
//!
//! The browser holds only a signed session id (`matchday.sid`). The record it
//! names lives in a [`store::SessionStore`] and slides forward on use.
//! [`layer::attach`] runs around every request; handlers read and write the
//! record through the [`Session`] extractor.

pub mod cookie;
pub mod forwarded;
pub mod handle;
pub mod layer;
pub mod policy;
pub mod record;
pub mod store;
pub mod sweeper;

pub use forwarded::Forwarded;
pub use handle::Session;
pub use policy::{CookieAttributes, SameSite, SessionPolicy, COOKIE_NAME};
pub use record::{fields, SessionRecord};
pub use store::{SessionStore, StoreError};
