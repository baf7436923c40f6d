//! Integration tests for credentials persisted on disk.

use market_session::adapters::FileCredentialStore;
use market_session::auth::{Credential, Role};
use market_session::endpoints;
use market_session::traits::CredentialStore;
use market_session::{SessionClient, SessionConfig};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dir: &TempDir) -> SessionConfig {
    SessionConfig::new()
        .with_api_base_url(format!("{}/api/v1", server.uri()))
        .with_credentials_dir(dir.path())
}

#[tokio::test]
async fn test_slots_survive_restart() {
    let dir = TempDir::new().unwrap();

    {
        let store = FileCredentialStore::with_dir(dir.path());
        store
            .set(Role::Shop, Credential::new(Role::Shop, "shop", Some("r".to_string())))
            .await
            .unwrap();
        store
            .set(Role::Admin, Credential::new(Role::Admin, "admin", None))
            .await
            .unwrap();
    }

    let reopened = FileCredentialStore::with_dir(dir.path());
    assert_eq!(
        reopened.get(Role::Shop).await.unwrap().unwrap().access_token,
        "shop"
    );
    assert!(reopened.get(Role::Customer).await.unwrap().is_none());

    reopened.clear(Role::Shop).await.unwrap();
    assert!(reopened.get(Role::Shop).await.unwrap().is_none());
    assert!(reopened.get(Role::Admin).await.unwrap().is_some());
}

#[tokio::test]
async fn test_corrupt_slot_reads_as_signed_out() {
    let dir = TempDir::new().unwrap();
    let store = FileCredentialStore::with_dir(dir.path());
    std::fs::write(store.manager().slot_path(Role::Vendor), "{not json").unwrap();

    assert!(store.get(Role::Vendor).await.unwrap().is_none());

    store
        .set(Role::Vendor, Credential::new(Role::Vendor, "v", None))
        .await
        .unwrap();
    assert_eq!(store.get(Role::Vendor).await.unwrap().unwrap().access_token, "v");
}

#[tokio::test]
async fn test_login_and_refresh_persist_across_clients() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login/vendor-shop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "first",
            "refreshToken": "refresh-1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh-token"))
        .and(header("Authorization", "Bearer refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "second"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/orders/shop"))
        .and(header("Authorization", "Bearer first"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(path("/api/v1/orders/shop"))
        .and(header("Authorization", "Bearer second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();

    let first = SessionClient::from_config(config_for(&server, &dir)).unwrap();
    first.login(Role::Shop, "shop@example.com", "pw").await.unwrap();
    drop(first);

    let second = SessionClient::from_config(config_for(&server, &dir)).unwrap();
    let execution = second
        .execute(&endpoints::shop_orders().unwrap(), Role::Shop)
        .await;
    assert_eq!(execution.envelope.status, 200);
    assert_eq!(execution.attempts, 2);
    drop(second);

    let third = SessionClient::from_config(config_for(&server, &dir)).unwrap();
    let stored = third.credential(Role::Shop).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "second");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
}
