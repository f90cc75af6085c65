//! Declarative session configuration: cookie shape, renewal, store binding keys.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{Config, RuntimeMode};
use crate::crypto::SessionKeys;

/// Name of the session cookie.
pub const COOKIE_NAME: &str = "matchday.sid";

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    /// Attribute value as written in `Set-Cookie`.
    pub fn as_attribute(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "strict",
            SameSite::Lax => "lax",
            SameSite::None => "none",
        }
    }
}

/// Cookie attributes. A snapshot is stored with every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieAttributes {
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub max_age_secs: u64,
    pub path: String,
    pub domain: Option<String>,
}

impl CookieAttributes {
    /// Development sends the cookie over plain HTTP with `SameSite=Lax`;
    /// production requires TLS and uses `SameSite=None` so a front-end on
    /// another origin still receives it.
    pub fn for_mode(mode: RuntimeMode, max_age_secs: u64, domain: Option<String>) -> Self {
        let (secure, same_site) = match mode {
            RuntimeMode::Development => (false, SameSite::Lax),
            RuntimeMode::Production => (true, SameSite::None),
        };
        Self {
            secure,
            http_only: true,
            same_site,
            max_age_secs,
            path: "/".into(),
            domain,
        }
    }
}

/// Session handling rules applied by [`crate::session::layer::attach`].
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub keys: SessionKeys,
    /// Rewrite unmodified existing records on every request.
    pub resave: bool,
    /// Persist sessions nobody wrote to.
    pub save_uninitialized: bool,
    /// Re-issue the cookie on every response for an existing session.
    pub rolling: bool,
    /// Sliding server-side expiry.
    pub ttl: Duration,
    /// Minimum record age before a read-only request refreshes its expiry.
    pub touch_interval: Duration,
    pub cookie: CookieAttributes,
    /// Reverse-proxy hops trusted for `X-Forwarded-*`.
    pub trust_proxy_hops: u8,
}

impl SessionPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            keys: SessionKeys::derive(&cfg.session_secret),
            resave: false,
            save_uninitialized: false,
            rolling: true,
            ttl: Duration::from_secs(cfg.session_ttl_secs),
            touch_interval: Duration::from_secs(cfg.session_touch_interval_secs),
            cookie: CookieAttributes::for_mode(
                cfg.app_env,
                cfg.session_cookie_max_age_secs,
                cfg.cookie_domain.clone(),
            ),
            trust_proxy_hops: cfg.trust_proxy_hops,
        }
    }
}
