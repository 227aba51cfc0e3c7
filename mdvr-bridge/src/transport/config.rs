//! HTTP client configuration.
//!
//! Lives under `[profiles.<name>.http]` in the registry document. Request
//! timeouts are not set here: every endpoint carries its own.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{BridgeError, Result};

/// `User-Agent` sent when the profile does not name one.
pub const DEFAULT_USER_AGENT: &str = concat!("mdvr-bridge/", env!("CARGO_PKG_VERSION"));

/// Connection settings of one vendor profile.
///
/// ```toml
/// [profiles.production.http]
/// pool_max_idle_per_host = 16
/// connect_timeout_secs = 5
/// http_version = "http1"
/// user_agent = "fleet-sync/2.3"
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Idle connections kept per vendor host.
    pub pool_max_idle_per_host: usize,
    /// Seconds before an idle pooled connection is closed.
    pub pool_idle_timeout_secs: u64,
    /// TCP and TLS connect timeout in seconds, 1 to 60.
    pub connect_timeout_secs: u64,
    /// Protocol the vendor gateway speaks.
    pub http_version: HttpVersion,
    /// `User-Agent` header; some gateways whitelist callers by it.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 8,
            pool_idle_timeout_secs: 90,
            connect_timeout_secs: 10,
            http_version: HttpVersion::Auto,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpConfig {
    /// Checks the settings before a client is built.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConfigError`] if the connect timeout is outside
    /// 1 to 60 seconds or the user agent is blank or contains control
    /// characters.
    pub fn validate(&self) -> Result<()> {
        if !(1..=60).contains(&self.connect_timeout_secs) {
            return Err(BridgeError::ConfigError(format!(
                "http.connect_timeout_secs must be between 1 and 60, got {}",
                self.connect_timeout_secs
            )));
        }
        if self.user_agent.trim().is_empty() || self.user_agent.chars().any(char::is_control) {
            return Err(BridgeError::ConfigError(
                "http.user_agent must be non-empty printable text".to_owned(),
            ));
        }
        Ok(())
    }

    /// Connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Idle timeout of pooled connections.
    #[must_use]
    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}

/// Protocol the vendor gateway speaks.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HttpVersion {
    /// HTTP/1.1 only. Most MDVR gateways speak nothing else.
    Http1,
    /// HTTP/2 with prior knowledge.
    Http2,
    /// Negotiate via ALPN.
    #[default]
    Auto,
}
