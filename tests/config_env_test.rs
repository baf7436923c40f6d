//! Integration tests for reading configuration from the environment.

use std::time::Duration;

use market_session::config::{
    ENV_API_BASE_URL, ENV_AUTH_BASE_URL, ENV_BROKER_URL, ENV_CREDENTIALS_DIR, ENV_HEARTBEAT_MS,
    ENV_RECONNECT_DELAY_MS,
};
use market_session::{SessionConfig, SessionError};
use serial_test::serial;

const ALL: [&str; 6] = [
    ENV_API_BASE_URL,
    ENV_AUTH_BASE_URL,
    ENV_BROKER_URL,
    ENV_RECONNECT_DELAY_MS,
    ENV_HEARTBEAT_MS,
    ENV_CREDENTIALS_DIR,
];

fn clear_env() {
    for name in ALL {
        std::env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    assert_eq!(SessionConfig::from_env().unwrap(), SessionConfig::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var(ENV_API_BASE_URL, "https://market.example/api/v1/");
    std::env::set_var(ENV_BROKER_URL, "wss://market.example/ws");
    std::env::set_var(ENV_RECONNECT_DELAY_MS, "1500");
    std::env::set_var(ENV_HEARTBEAT_MS, "0");
    std::env::set_var(ENV_CREDENTIALS_DIR, "/var/lib/market/credentials");

    let config = SessionConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.api_base_url, "https://market.example/api/v1");
    assert_eq!(config.auth_base_url, "https://market.example/api/v1/auth");
    assert_eq!(config.broker_url, "wss://market.example/ws");
    assert_eq!(config.reconnect_delay, Duration::from_millis(1500));
    assert_eq!(config.heart_beat_ms, 0);
    assert_eq!(
        config.credentials_dir.as_deref(),
        Some(std::path::Path::new("/var/lib/market/credentials"))
    );

    let channel = config.channel_config();
    assert_eq!(channel.host, "market.example");
    assert_eq!(channel.reconnect_delay, Duration::from_millis(1500));
}

#[test]
#[serial]
fn test_from_env_rejects_bad_values() {
    clear_env();
    std::env::set_var(ENV_RECONNECT_DELAY_MS, "-5");
    let result = SessionConfig::from_env();
    clear_env();
    assert!(matches!(result, Err(SessionError::Config(_))));

    std::env::set_var(ENV_AUTH_BASE_URL, "ftp://market.example/auth");
    let result = SessionConfig::from_env();
    clear_env();
    assert!(matches!(result, Err(SessionError::Config(_))));
}
