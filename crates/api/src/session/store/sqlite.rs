//! SQLite session store.
//!
//! Rows hold the sealed record body next to plain expiry columns, so sweeping
//! never needs the store key.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{SessionStore, StoreError};
use crate::crypto::Sealer;
use crate::session::policy::CookieAttributes;
use crate::session::record::{now_ms, SessionRecord};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        last_touch_ms INTEGER NOT NULL,
        expires_at_ms INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS sessions_expires_at ON sessions (expires_at_ms);";

/// The sealed part of a row.
#[derive(Serialize, Deserialize)]
struct Body {
    data: Map<String, Value>,
    cookie: CookieAttributes,
}

pub struct SqliteStore {
    /// `None` once closed.
    pool: ArcSwapOption<Pool<SqliteConnectionManager>>,
    sealer: Arc<Sealer>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("open", &self.pool.load().is_some())
            .finish()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: PathBuf, sealer: Sealer) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
            .with_init(|c| {
                c.busy_timeout(Duration::from_millis(500))?;
                c.pragma_update(None, "journal_mode", "WAL")?;
                c.execute_batch(SCHEMA)
            });
        Self::build(manager, 8, sealer).await
    }

    /// Private in-memory database. A single pooled connection keeps it alive.
    pub async fn open_in_memory(sealer: Sealer) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory().with_init(|c| c.execute_batch(SCHEMA));
        Self::build(manager, 1, sealer).await
    }

    async fn build(manager: SqliteConnectionManager, max_size: u32, sealer: Sealer) -> Result<Self, StoreError> {
        let pool = tokio::task::spawn_blocking(move || {
            Pool::builder()
                .max_size(max_size)
                .connection_timeout(Duration::from_secs(5))
                .build(manager)
        })
        .await
        .map_err(backend)?
        .map_err(backend)?;

        Ok(Self {
            pool: ArcSwapOption::from_pointee(pool),
            sealer: Arc::new(sealer),
        })
    }

    /// Run `f` on a pooled connection off the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.load_full().ok_or(StoreError::Closed)?;
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(backend)?;
            f(&conn)
        })
        .await
        .map_err(backend)?
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let id = id.to_owned();
        let sealer = self.sealer.clone();
        let now = clamp_ms(now_ms());
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT payload, last_touch_ms, expires_at_ms FROM sessions
                     WHERE id = ?1 AND expires_at_ms > ?2",
                    params![id, now],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
                )
                .optional()
                .map_err(backend)?;
            let Some((payload, last_touch, expires_at)) = row else {
                return Ok(None);
            };

            let plain = sealer
                .open(&id, &payload)
                .map_err(|e| StoreError::Codec(e.to_string()))?;
            let body: Body = serde_json::from_slice(&plain).map_err(|e| StoreError::Codec(e.to_string()))?;
            Ok(Some(SessionRecord {
                id,
                data: body.data,
                cookie: body.cookie,
                last_touch_ms: from_sql_ms(last_touch)?,
                expires_at_ms: from_sql_ms(expires_at)?,
            }))
        })
        .await
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let body = serde_json::to_vec(&Body {
            data: record.data.clone(),
            cookie: record.cookie.clone(),
        })
        .map_err(|e| StoreError::Codec(e.to_string()))?;
        let payload = self
            .sealer
            .seal(&record.id, &body)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        let id = record.id.clone();
        let (last_touch, expires_at) = (to_sql_ms(record.last_touch_ms)?, to_sql_ms(record.expires_at_ms)?);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, payload, last_touch_ms, expires_at_ms) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    payload = excluded.payload,
                    last_touch_ms = excluded.last_touch_ms,
                    expires_at_ms = excluded.expires_at_ms",
                params![id, payload, last_touch, expires_at],
            )
            .map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn touch(&self, id: &str, last_touch_ms: u64, expires_at_ms: u64) -> Result<(), StoreError> {
        let id = id.to_owned();
        let (last_touch, expires_at) = (to_sql_ms(last_touch_ms)?, to_sql_ms(expires_at_ms)?);
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE sessions SET last_touch_ms = ?2, expires_at_ms = ?3 WHERE id = ?1",
                params![id, last_touch, expires_at],
            )
            .map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_owned();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])
                .map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn clear_expired(&self, now_ms: u64) -> Result<usize, StoreError> {
        let now = clamp_ms(now_ms);
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sessions WHERE expires_at_ms <= ?1", params![now])
                .map_err(backend)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        // Operations already holding the pool finish on their own clone.
        if let Some(pool) = self.pool.swap(None) {
            tokio::task::spawn_blocking(move || drop(pool))
                .await
                .map_err(backend)?;
        }
        Ok(())
    }
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// SQLite integers are signed; a timestamp past `i64::MAX` is refused rather
/// than wrapped into the past.
fn to_sql_ms(ms: u64) -> Result<i64, StoreError> {
    i64::try_from(ms).map_err(|_| StoreError::Codec(format!("timestamp {ms} out of range")))
}

fn from_sql_ms(ms: i64) -> Result<u64, StoreError> {
    u64::try_from(ms).map_err(|_| StoreError::Codec(format!("negative timestamp {ms}")))
}

fn clamp_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}
