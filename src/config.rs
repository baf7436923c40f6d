//! Session configuration.
//!
//! Built with `with_*` methods or read from the environment:
//!
//! | Variable | Default |
//! |---|---|
//! | `MARKET_API_BASE_URL` | `http://localhost:8080/api/v1` |
//! | `MARKET_AUTH_BASE_URL` | `<api base>/auth` |
//! | `MARKET_BROKER_URL` | `ws://localhost:8080/ws` |
//! | `MARKET_RECONNECT_DELAY_MS` | `5000` |
//! | `MARKET_HEARTBEAT_MS` | `4000` |
//! | `MARKET_CREDENTIALS_DIR` | `~/.market-session/credentials` |

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{SessionError, SessionResult};
use crate::notifications::channel::{
    ChannelConfig, DEFAULT_BROKER_URL, DEFAULT_HEARTBEAT_MS, DEFAULT_RECONNECT_DELAY,
};
use crate::notifications::HeartBeat;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";

pub const ENV_API_BASE_URL: &str = "MARKET_API_BASE_URL";
pub const ENV_AUTH_BASE_URL: &str = "MARKET_AUTH_BASE_URL";
pub const ENV_BROKER_URL: &str = "MARKET_BROKER_URL";
pub const ENV_RECONNECT_DELAY_MS: &str = "MARKET_RECONNECT_DELAY_MS";
pub const ENV_HEARTBEAT_MS: &str = "MARKET_HEARTBEAT_MS";
pub const ENV_CREDENTIALS_DIR: &str = "MARKET_CREDENTIALS_DIR";

/// Endpoints and timings for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Base URL of the business API, without trailing slash.
    pub api_base_url: String,
    /// Base URL of the auth endpoints. Defaults to `<api_base_url>/auth`.
    pub auth_base_url: String,
    pub broker_url: String,
    pub reconnect_delay: Duration,
    /// Heart-beat offered to the broker in both directions. 0 disables.
    pub heart_beat_ms: u64,
    /// Credential directory. `None` means the per-user default.
    pub credentials_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_base_url: auth_base_for(DEFAULT_API_BASE_URL),
            broker_url: DEFAULT_BROKER_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            heart_beat_ms: DEFAULT_HEARTBEAT_MS,
            credentials_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL. Also moves the auth base URL to `<url>/auth`;
    /// call [`with_auth_base_url`](Self::with_auth_base_url) afterwards to
    /// override it.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = trim_url(url.into());
        self.auth_base_url = auth_base_for(&self.api_base_url);
        self
    }

    pub fn with_auth_base_url(mut self, url: impl Into<String>) -> Self {
        self.auth_base_url = trim_url(url.into());
        self
    }

    pub fn with_broker_url(mut self, url: impl Into<String>) -> Self {
        self.broker_url = trim_url(url.into());
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_heart_beat_ms(mut self, ms: u64) -> Self {
        self.heart_beat_ms = ms;
        self
    }

    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = Some(dir.into());
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> SessionResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> SessionResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(url) = var(ENV_API_BASE_URL) {
            config = config.with_api_base_url(url);
        }
        if let Some(url) = var(ENV_AUTH_BASE_URL) {
            config = config.with_auth_base_url(url);
        }
        if let Some(url) = var(ENV_BROKER_URL) {
            config = config.with_broker_url(url);
        }
        if let Some(ms) = var(ENV_RECONNECT_DELAY_MS) {
            config.reconnect_delay = Duration::from_millis(parse_ms(ENV_RECONNECT_DELAY_MS, &ms)?);
        }
        if let Some(ms) = var(ENV_HEARTBEAT_MS) {
            config.heart_beat_ms = parse_ms(ENV_HEARTBEAT_MS, &ms)?;
        }
        if let Some(dir) = var(ENV_CREDENTIALS_DIR) {
            config.credentials_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check URL schemes.
    pub fn validate(&self) -> SessionResult<()> {
        require_scheme("API base URL", &self.api_base_url, &["http://", "https://"])?;
        require_scheme("auth base URL", &self.auth_base_url, &["http://", "https://"])?;
        require_scheme("broker URL", &self.broker_url, &["ws://", "wss://"])?;
        Ok(())
    }

    /// Channel settings derived from this configuration.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::new(self.broker_url.clone())
            .with_heart_beat(HeartBeat::new(self.heart_beat_ms, self.heart_beat_ms))
            .with_reconnect_delay(self.reconnect_delay)
    }
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn auth_base_for(api_base_url: &str) -> String {
    format!("{}/auth", api_base_url)
}

fn parse_ms(name: &str, value: &str) -> SessionResult<u64> {
    value
        .parse::<u64>()
        .map_err(|_| SessionError::Config(format!("{} must be a number of milliseconds, got {:?}", name, value)))
}

fn require_scheme(what: &str, url: &str, schemes: &[&str]) -> SessionResult<()> {
    if schemes.iter().any(|scheme| url.starts_with(scheme)) {
        Ok(())
    } else {
        Err(SessionError::Config(format!(
            "{} must start with one of {:?}: {}",
            what, schemes, url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.auth_base_url, "http://localhost:8080/api/v1/auth");
        assert_eq!(config.reconnect_delay, Duration::from_millis(5000));
        assert_eq!(config.heart_beat_ms, 4000);
        assert!(config.credentials_dir.is_none());
    }

    #[test]
    fn test_api_base_moves_auth_base() {
        let config = SessionConfig::from_lookup(lookup(&[(
            ENV_API_BASE_URL,
            "https://market.example/api/v1/",
        )]))
        .unwrap();
        assert_eq!(config.api_base_url, "https://market.example/api/v1");
        assert_eq!(config.auth_base_url, "https://market.example/api/v1/auth");
    }

    #[test]
    fn test_explicit_auth_base_wins() {
        let config = SessionConfig::from_lookup(lookup(&[
            (ENV_API_BASE_URL, "https://market.example/api/v1"),
            (ENV_AUTH_BASE_URL, "https://auth.example/"),
        ]))
        .unwrap();
        assert_eq!(config.auth_base_url, "https://auth.example");
    }

    #[test]
    fn test_invalid_values() {
        let err = SessionConfig::from_lookup(lookup(&[(ENV_HEARTBEAT_MS, "soon")])).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));

        let err =
            SessionConfig::from_lookup(lookup(&[(ENV_BROKER_URL, "http://localhost:8080/ws")]))
                .unwrap_err();
        assert!(err.to_string().contains("broker URL"));
    }

    #[test]
    fn test_channel_config() {
        let channel = SessionConfig::new()
            .with_broker_url("wss://push.example/ws")
            .with_heart_beat_ms(0)
            .with_reconnect_delay(Duration::from_millis(250))
            .channel_config();
        assert_eq!(channel.broker_url, "wss://push.example/ws");
        assert_eq!(channel.host, "push.example");
        assert_eq!(channel.heart_beat, HeartBeat::disabled());
        assert_eq!(channel.reconnect_delay, Duration::from_millis(250));
    }
}
