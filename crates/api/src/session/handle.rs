//! Per-request session handle and its extractor.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{extract::FromRequestParts, http::request::Parts};
use common::ServiceError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use super::policy::CookieAttributes;
use super::record::{fields, SessionRecord};
use crate::server::error::ApiError;

/// Reason the session layer ran without a session for this request.
#[derive(Debug, Clone)]
pub(crate) struct Unavailable(pub String);

/// The request's session.
///
/// Cheap to clone; every clone edits the same record. The session layer reads
/// the final state back after the handler returns and decides what to persist.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    record: SessionRecord,
    is_new: bool,
    modified: bool,
}

/// Final state of a session after the handler ran.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub record: SessionRecord,
    pub is_new: bool,
    pub modified: bool,
}

impl Session {
    pub(crate) fn loaded(record: SessionRecord) -> Self {
        Self::wrap(record, false)
    }

    pub(crate) fn fresh(record: SessionRecord) -> Self {
        Self::wrap(record, true)
    }

    fn wrap(record: SessionRecord, is_new: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                record,
                is_new,
                modified: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.lock().record.id.clone()
    }

    /// `true` until the record has been persisted once.
    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    /// Typed read of one key. Missing keys and type mismatches both give `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock().record.data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    /// Store `value` under `key`. Writing an identical value is not a change.
    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut inner = self.lock();
        if inner.record.data.get(key) != Some(&value) {
            inner.record.data.insert(key.to_owned(), value);
            inner.modified = true;
        }
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.lock();
        let removed = inner.record.data.remove(key);
        if removed.is_some() {
            inner.modified = true;
        }
        removed
    }

    /// Copy of every stored key.
    pub fn data(&self) -> Map<String, Value> {
        self.lock().record.data.clone()
    }

    pub fn cookie(&self) -> CookieAttributes {
        self.lock().record.cookie.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.get(fields::USER_ID)
    }

    pub fn is_logged_in(&self) -> bool {
        self.get(fields::LOGGED_IN).unwrap_or(false)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            record: inner.record.clone(),
            is_new: inner.is_new,
            modified: inner.modified,
        }
    }
}

/// Handlers that need a session take `Session`; ones that can live without
/// take `Option<Session>`.
///
/// Rejects with `503 session_store_unavailable` when the store could not be
/// reached for this request.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }
        let reason = parts
            .extensions
            .get::<Unavailable>()
            .map_or_else(|| "session layer not installed".to_owned(), |u| u.0.clone());
        Err(ServiceError::SessionStoreUnavailable(reason).into())
    }
}
