//! The persisted session record.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::policy::CookieAttributes;

/// Well-known keys in [`SessionRecord::data`].
pub mod fields {
    pub const USER_ID: &str = "userId";
    pub const USERNAME: &str = "username";
    pub const EMAIL: &str = "email";
    pub const LOGGED_IN: &str = "isLoggedIn";
    pub const VIEWS: &str = "views";
    pub const DEBUG: &str = "debug";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub data: Map<String, Value>,
    pub cookie: CookieAttributes,
    /// Unix millis of the last save or touch.
    pub last_touch_ms: u64,
    /// Unix millis after which the record is gone.
    pub expires_at_ms: u64,
}

impl SessionRecord {
    /// Mint an empty record with a fresh server-generated id.
    pub fn mint(cookie: CookieAttributes, now_ms: u64, ttl: Duration) -> Self {
        let mut record = Self {
            id: new_session_id(),
            data: Map::new(),
            cookie,
            last_touch_ms: now_ms,
            expires_at_ms: now_ms,
        };
        record.touch(now_ms, ttl);
        record
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Slide the expiry window forward from `now_ms`.
    pub fn touch(&mut self, now_ms: u64, ttl: Duration) {
        self.last_touch_ms = now_ms;
        self.expires_at_ms = now_ms.saturating_add(ttl.as_millis() as u64);
    }
}

/// 128-bit random id, hex encoded.
pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
