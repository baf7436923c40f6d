//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use market_session::adapters::mock::{InMemoryCredentialStore, MockBroker};
use market_session::adapters::ReqwestHttpClient;
use market_session::auth::{Credential, Role};
use market_session::notifications::{ConnectionState, NotificationChannel};
use market_session::{SessionClient, SessionConfig};
use wiremock::MockServer;

pub const WAIT: Duration = Duration::from_secs(5);

/// Shop credential whose access token the test server treats as expired.
pub fn expired_shop_credential() -> Credential {
    Credential::new(Role::Shop, "expired-token", Some("refresh-1".to_string()))
}

pub fn customer_credential() -> Credential {
    Credential::new(Role::Customer, "customer-token", Some("customer-refresh".to_string()))
}

/// Session client talking to `server` over real HTTP, with an in-memory store.
pub fn session_for(server: &MockServer, store: &InMemoryCredentialStore) -> SessionClient {
    let config = SessionConfig::new().with_api_base_url(format!("{}/api/v1", server.uri()));
    SessionClient::new(
        config,
        Arc::new(ReqwestHttpClient::new()),
        Arc::new(store.clone()),
        Arc::new(MockBroker::new()),
    )
}

/// Wait until the channel reports `state`.
pub async fn wait_for_state(channel: &NotificationChannel, state: ConnectionState) {
    let mut rx = channel.state_receiver();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {:?}", state))
        .expect("channel task ended");
}

/// Poll `condition` until it holds.
pub async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
