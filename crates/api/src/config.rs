//! Configuration loading and validation for the API service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any required variable is missing or invalid.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cors::Allowlist;

/// Minimum accepted length of `SESSION_SECRET`.
pub const MIN_SECRET_LEN: usize = 16;

/// Longest accepted `SESSION_TTL_SECS` (ten years).
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 86_400;

/// Runtime mode, read from `APP_ENV`.
///
/// Development relaxes cookie attributes and lets unknown origins through with
/// a warning; production enforces both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    #[serde(alias = "dev")]
    Development,
    #[serde(alias = "prod")]
    Production,
}

impl RuntimeMode {
    pub fn is_development(self) -> bool {
        self == RuntimeMode::Development
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeMode::Development => "development",
            RuntimeMode::Production => "production",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated API service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `development` or `production`.
    #[serde(default)]
    pub app_env: RuntimeMode,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Secret the cookie-signing and record-sealing keys are derived from. **Required.**
    pub session_secret: String,

    /// Session store connection string (`sqlite://<path>`, `sqlite::memory:`,
    /// `memory://`). **Required.**
    pub session_store_url: String,

    /// Comma-separated origin allowlist, compared byte-for-byte.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,

    /// Number of reverse-proxy hops trusted for `X-Forwarded-*` headers.
    #[serde(default = "default_trust_proxy_hops")]
    pub trust_proxy_hops: u8,

    /// Enables `GET /api/debug/me`, which echoes session contents.
    #[serde(default)]
    pub diagnostics_enabled: bool,

    /// Budget for the graceful shutdown sequence before a forced exit.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Sliding server-side session expiry.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Minimum age of a record before a read-only request refreshes its expiry.
    #[serde(default = "default_touch_interval")]
    pub session_touch_interval_secs: u64,

    /// `Max-Age` sent with the session cookie.
    #[serde(default = "default_cookie_max_age")]
    pub session_cookie_max_age_secs: u64,

    /// How often expired records are swept from the store.
    #[serde(default = "default_sweep_interval")]
    pub session_sweep_interval_secs: u64,

    /// Optional `Domain` attribute for the session cookie.
    #[serde(default)]
    pub cookie_domain: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional OTLP endpoint; spans are only exported when set.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_port() -> u16 {
    5000
}
fn default_allowed_origins() -> String {
    "http://localhost:3000,http://localhost:5173".into()
}
fn default_trust_proxy_hops() -> u8 {
    1
}
fn default_shutdown_timeout() -> u64 {
    10
}
fn default_session_ttl() -> u64 {
    14 * 24 * 60 * 60
}
fn default_touch_interval() -> u64 {
    24 * 60 * 60
}
fn default_cookie_max_age() -> u64 {
    7 * 24 * 60 * 60
}
fn default_sweep_interval() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Configuration with every optional field at its default, for tests and
    /// embedding hosts that assemble their own settings.
    pub fn with_required(session_secret: impl Into<String>, session_store_url: impl Into<String>) -> Self {
        Self {
            app_env: RuntimeMode::default(),
            port: default_port(),
            session_secret: session_secret.into(),
            session_store_url: session_store_url.into(),
            allowed_origins: default_allowed_origins(),
            trust_proxy_hops: default_trust_proxy_hops(),
            diagnostics_enabled: false,
            shutdown_timeout_secs: default_shutdown_timeout(),
            session_ttl_secs: default_session_ttl(),
            session_touch_interval_secs: default_touch_interval(),
            session_cookie_max_age_secs: default_cookie_max_age(),
            session_sweep_interval_secs: default_sweep_interval(),
            cookie_domain: None,
            log_level: default_log_level(),
            otel_exporter_otlp_endpoint: None,
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.session_secret, "SESSION_SECRET")?;
        ensure_non_empty(&self.session_store_url, "SESSION_STORE_URL")?;

        if self.session_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("SESSION_SECRET must be at least {MIN_SECRET_LEN} characters");
        }
        if self.shutdown_timeout_secs == 0 {
            anyhow::bail!("SHUTDOWN_TIMEOUT_SECS must be > 0");
        }
        if self.session_ttl_secs == 0 {
            anyhow::bail!("SESSION_TTL_SECS must be > 0");
        }
        if self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            anyhow::bail!("SESSION_TTL_SECS must be at most {MAX_SESSION_TTL_SECS}");
        }
        if self.session_sweep_interval_secs == 0 {
            anyhow::bail!("SESSION_SWEEP_INTERVAL_SECS must be > 0");
        }
        Ok(())
    }

    /// Parse `ALLOWED_ORIGINS` into the immutable allowlist.
    pub fn allowlist(&self) -> Allowlist {
        Allowlist::parse(&self.allowed_origins)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        ([0, 0, 0, 0], self.port).into()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}
