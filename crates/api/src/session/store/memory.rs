use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SessionStore, StoreError};
use crate::session::record::{now_ms, SessionRecord};

/// Process-local store. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, SessionRecord>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.ensure_open()?;
        let now = now_ms();
        Ok(self
            .records
            .read()
            .await
            .get(id)
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn touch(&self, id: &str, last_touch_ms: u64, expires_at_ms: u64) -> Result<(), StoreError> {
        self.ensure_open()?;
        if let Some(record) = self.records.write().await.get_mut(id) {
            record.last_touch_ms = last_touch_ms;
            record.expires_at_ms = expires_at_ms;
        }
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn clear_expired(&self, now_ms: u64) -> Result<usize, StoreError> {
        self.ensure_open()?;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now_ms));
        Ok(before - records.len())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        self.records.write().await.clear();
        Ok(())
    }
}
