//! Client configuration.

use std::{path::PathBuf, time::Duration};

use commitfield_core::{ReconnectPolicy, UserId};
use url::Url;

use crate::error::ConfigError;

/// Default REST base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8090";

/// Default real-time endpoint path.
pub const DEFAULT_WS_PATH: &str = "/ws/chat";

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// REST base URL. The WebSocket URL is derived from it.
    pub api_base_url: String,
    /// Real-time endpoint path.
    pub ws_path: String,
    /// Delay before each reconnection attempt.
    pub reconnect_delay: Duration,
    /// Reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Outbound queue bound.
    pub outbound_capacity: usize,
    /// Page size for room lists.
    pub room_page_size: u32,
    /// Validity of a cached room list.
    pub room_cache_ttl: Duration,
    /// Messages kept per room in the local cache.
    pub message_cache_limit: usize,
    /// Subscribe to the notification channel on every open.
    pub notifications: bool,
    /// REST request timeout.
    pub request_timeout: Duration,
    /// Local cache directory. `None` uses the platform cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            ws_path: DEFAULT_WS_PATH.to_owned(),
            reconnect_delay: policy.delay,
            max_reconnect_attempts: policy.max_attempts,
            outbound_capacity: commitfield_core::outbound::DEFAULT_OUTBOUND_CAPACITY,
            room_page_size: 10,
            room_cache_ttl: Duration::from_secs(10),
            message_cache_limit: 100,
            notifications: true,
            request_timeout: Duration::from_secs(15),
            cache_dir: None,
        }
    }
}

impl ClientConfig {
    /// Reconnection policy for the connection state machine.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy { delay: self.reconnect_delay, max_attempts: self.max_reconnect_attempts }
    }

    /// Parsed REST base URL.
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.api_base_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.api_base_url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_owned())),
        }
    }

    /// WebSocket URL: `http` becomes `ws`, `https` becomes `wss`.
    pub fn ws_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.api_url()?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };

        url.set_scheme(scheme).map_err(|()| ConfigError::UnsupportedScheme(scheme.to_owned()))?;
        url.set_path(&self.ws_path);
        url.set_query(None);
        Ok(url)
    }

    /// Cache directory, falling back to the platform cache directory.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir().map(|d| d.join("commitfield")).ok_or(ConfigError::NoCacheDir),
        }
    }
}

/// Who the client acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Backend user id.
    pub user_id: UserId,
    /// Display name sent as `from`.
    pub nickname: String,
    /// Session cookie value. The OAuth login that produces it is external.
    pub session: Option<String>,
}

impl Identity {
    /// Identity without a session cookie.
    pub fn new(user_id: UserId, nickname: impl Into<String>) -> Self {
        Self { user_id, nickname: nickname.into(), session: None }
    }

    /// `Cookie` header value, if a session is set.
    pub fn cookie_header(&self) -> Option<String> {
        self.session.as_ref().map(|s| {
            if s.contains('=') { s.clone() } else { format!("JSESSIONID={s}") }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.message_cache_limit, 100);
        assert_eq!(config.room_page_size, 10);
    }

    #[test]
    fn ws_url_follows_scheme() {
        let config = ClientConfig::default();
        assert_eq!(config.ws_url().unwrap().as_str(), "ws://localhost:8090/ws/chat");

        let secure = ClientConfig {
            api_base_url: "https://api.commitfield.example/v1?x=1".into(),
            ..ClientConfig::default()
        };
        assert_eq!(secure.ws_url().unwrap().as_str(), "wss://api.commitfield.example/ws/chat");
    }

    #[test]
    fn rejects_non_http_base() {
        let config = ClientConfig { api_base_url: "ftp://host".into(), ..ClientConfig::default() };
        assert_eq!(config.ws_url(), Err(ConfigError::UnsupportedScheme("ftp".into())));
        let bad = ClientConfig { api_base_url: "not a url".into(), ..ClientConfig::default() };
        assert!(matches!(bad.api_url(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn cookie_header() {
        let mut id = Identity::new(1, "kim");
        assert_eq!(id.cookie_header(), None);
        id.session = Some("abc".into());
        assert_eq!(id.cookie_header().as_deref(), Some("JSESSIONID=abc"));
        id.session = Some("SESSION=xyz".into());
        assert_eq!(id.cookie_header().as_deref(), Some("SESSION=xyz"));
    }
}
