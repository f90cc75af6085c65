//! Session persistence behind the [`SessionStore`] trait.
//!
//! Two adapters ship with the service:
//! - [`MemoryStore`]: process-local map, for development and tests
//! - [`SqliteStore`]: r2d2-pooled SQLite, records sealed at rest
//!
//! [`open`] picks one from the `SESSION_STORE_URL` connection string.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::record::SessionRecord;
use crate::crypto::{Sealer, SessionKeys};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was closed by the shutdown sequence.
    #[error("session store is closed")]
    Closed,

    /// The backend rejected or failed an operation.
    #[error("session store backend error: {0}")]
    Backend(String),

    /// A persisted record could not be decoded or authenticated.
    #[error("session record could not be decoded: {0}")]
    Codec(String),

    #[error("unsupported session store url scheme `{0}`")]
    UnsupportedUrl(String),
}

/// Persistence for session records.
///
/// Every method is safe to call concurrently. After [`SessionStore::close`]
/// returns, every other method fails with [`StoreError::Closed`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short adapter name reported by `/health`.
    fn kind(&self) -> &'static str;

    /// Fetch a live record. Missing and expired records both yield `None`.
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Insert or replace a record.
    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// Refresh the expiry of an existing record without rewriting its data.
    async fn touch(&self, id: &str, last_touch_ms: u64, expires_at_ms: u64) -> Result<(), StoreError>;

    async fn destroy(&self, id: &str) -> Result<(), StoreError>;

    /// Delete every record expired at `now_ms`, returning how many went.
    async fn clear_expired(&self, now_ms: u64) -> Result<usize, StoreError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release backend resources. Idempotent.
    async fn close(&self) -> Result<(), StoreError>;
}

/// Parsed `SESSION_STORE_URL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUrl {
    Memory,
    SqliteMemory,
    SqliteFile(PathBuf),
}

impl StoreUrl {
    pub fn parse(url: &str) -> Result<Self, StoreError> {
        let url = url.trim();
        match url {
            "memory" | "memory://" => return Ok(StoreUrl::Memory),
            "sqlite::memory:" | "sqlite://:memory:" => return Ok(StoreUrl::SqliteMemory),
            _ => {}
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .filter(|p| !p.is_empty());
        match path {
            Some(path) => Ok(StoreUrl::SqliteFile(PathBuf::from(path))),
            // Only the scheme is echoed back; the rest may carry credentials.
            None => Err(StoreError::UnsupportedUrl(
                url.split_once(':').map_or(url, |(scheme, _)| scheme).to_owned(),
            )),
        }
    }
}

/// Open the store named by `url`. Records in SQLite are sealed with the
/// store key from `keys`.
pub async fn open(url: &str, keys: &SessionKeys) -> Result<Arc<dyn SessionStore>, StoreError> {
    let store: Arc<dyn SessionStore> = match StoreUrl::parse(url)? {
        StoreUrl::Memory => Arc::new(MemoryStore::new()),
        StoreUrl::SqliteMemory => Arc::new(SqliteStore::open_in_memory(Sealer::new(&keys.sealing)).await?),
        StoreUrl::SqliteFile(path) => Arc::new(SqliteStore::open(path, Sealer::new(&keys.sealing)).await?),
    };
    Ok(store)
}
