//! Session facade.
//!
//! [`SessionClient`] wires the credential store, auth API, request executor,
//! refresh coordinator and retry policy together. It is what a console holds
//! on to.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::adapters::{FileCredentialStore, ReqwestHttpClient, TungsteniteConnector};
use crate::auth::{
    AuthApi, AuthApiError, Credential, RefreshCoordinator, RefreshState, Role, SignOut,
};
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::notifications::ShopNotifications;
use crate::request::{Execution, RequestDescriptor, RequestExecutor, RetryPolicy};
use crate::traits::{BrokerConnector, CredentialStore, HttpClient};

/// Authenticated session across all four roles.
#[derive(Clone)]
pub struct SessionClient {
    config: SessionConfig,
    store: Arc<dyn CredentialStore>,
    api: AuthApi,
    policy: RetryPolicy,
    connector: Arc<dyn BrokerConnector>,
}

impl SessionClient {
    /// Build a client over explicit seams.
    pub fn new(
        config: SessionConfig,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn CredentialStore>,
        connector: Arc<dyn BrokerConnector>,
    ) -> Self {
        let api = AuthApi::new(config.auth_base_url.clone(), Arc::clone(&http));
        let executor = RequestExecutor::new(config.api_base_url.clone(), http, Arc::clone(&store));
        let coordinator = RefreshCoordinator::new(api.clone(), Arc::clone(&store));

        Self {
            config,
            store,
            api,
            policy: RetryPolicy::new(executor, coordinator),
            connector,
        }
    }

    /// Build a client with the production adapters.
    pub fn from_config(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;

        let store = match &config.credentials_dir {
            Some(dir) => FileCredentialStore::with_dir(dir),
            None => FileCredentialStore::new()?,
        };
        tracing::debug!(dir = %store.manager().dir().display(), "Using credential directory");

        Ok(Self::new(
            config,
            Arc::new(ReqwestHttpClient::new()),
            Arc::new(store),
            Arc::new(TungsteniteConnector::new()),
        ))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        self.policy.coordinator()
    }

    /// Run a logical request as `role`, refreshing and retrying once on 401.
    pub async fn execute(&self, descriptor: &RequestDescriptor, role: Role) -> Execution {
        self.policy.execute(descriptor, role).await
    }

    /// Sign in and store the resulting credential in the role's slot.
    pub async fn login(&self, role: Role, email: &str, password: &str) -> SessionResult<Credential> {
        let tokens = self
            .api
            .login(role, email, password)
            .await
            .map_err(|e| match e {
                AuthApiError::ServerError { status, message } => {
                    SessionError::LoginRejected { status, message }
                }
                AuthApiError::Http(e) => SessionError::Transport(e.to_string()),
                AuthApiError::Json(e) => SessionError::Serialization(e),
            })?;

        let credential = Credential::new(role, tokens.access_token, tokens.refresh_token);
        self.coordinator()
            .replace(role, Some(credential.clone()))
            .await?;

        tracing::info!(role = %role, "Signed in");
        Ok(credential)
    }

    /// Clear the role's slot. Other roles are untouched, and a refresh still
    /// running for this role will not bring the session back.
    pub async fn logout(&self, role: Role) -> SessionResult<()> {
        self.coordinator().replace(role, None).await?;
        tracing::info!(role = %role, "Signed out");
        Ok(())
    }

    pub async fn credential(&self, role: Role) -> SessionResult<Option<Credential>> {
        Ok(self.store.get(role).await?)
    }

    /// Ask the server whether the role's stored token is still valid.
    ///
    /// `false` when the role has no credential.
    pub async fn is_token_valid(&self, role: Role) -> SessionResult<bool> {
        let Some(credential) = self.store.get(role).await? else {
            return Ok(false);
        };

        self.api
            .is_token_valid(&credential.access_token)
            .await
            .map_err(|e| match e {
                AuthApiError::Json(e) => SessionError::Serialization(e),
                other => SessionError::Transport(other.to_string()),
            })
    }

    /// Forced sign-outs after failed refreshes.
    pub fn sign_outs(&self) -> broadcast::Receiver<SignOut> {
        self.coordinator().sign_outs()
    }

    pub async fn refresh_state(&self, role: Role) -> RefreshState {
        self.coordinator().state(role).await
    }

    /// Live order notifications for the shop console.
    pub fn shop_notifications(&self) -> ShopNotifications {
        ShopNotifications::new(self.config.channel_config(), Arc::clone(&self.connector))
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryCredentialStore, MockBroker, MockHttpClient, MockResponse};
    use crate::traits::{HttpError, Response};
    use serde_json::json;

    const AUTH: &str = "http://localhost:8080/api/v1/auth";

    fn client(mock: &MockHttpClient, store: &InMemoryCredentialStore) -> SessionClient {
        SessionClient::new(
            SessionConfig::default(),
            Arc::new(mock.clone()),
            Arc::new(store.clone()),
            Arc::new(MockBroker::new()),
        )
    }

    #[tokio::test]
    async fn test_login_stores_credential_for_role() {
        let mock = MockHttpClient::new();
        mock.set_response(
            &format!("{}/login/vendor-shop", AUTH),
            MockResponse::Success(Response::json_body(
                200,
                &json!({"accessToken": "a", "refreshToken": "r"}),
            )),
        );
        let store = InMemoryCredentialStore::new();

        let credential = client(&mock, &store)
            .login(Role::Shop, "shop@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(credential.role, Role::Shop);
        assert_eq!(store.peek(Role::Shop).unwrap().access_token, "a");
        assert!(store.peek(Role::Vendor).is_none());

        let sent: serde_json::Value =
            serde_json::from_str(mock.get_requests()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, json!({"email": "shop@example.com", "password": "pw"}));
    }

    #[tokio::test]
    async fn test_login_rejection_and_transport_errors() {
        let mock = MockHttpClient::new();
        mock.set_response(
            &format!("{}/login/admin", AUTH),
            MockResponse::Success(Response::json_body(401, &json!({"message": "Bad credentials"}))),
        );
        mock.set_response(
            &format!("{}/login/customer", AUTH),
            MockResponse::Error(HttpError::Timeout("login".to_string())),
        );
        let store = InMemoryCredentialStore::new();
        let client = client(&mock, &store);

        let err = client.login(Role::Admin, "a", "b").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::LoginRejected { status: 401, ref message } if message == "Bad credentials"
        ));
        assert!(err.requires_reauth());

        let err = client.login(Role::Customer, "a", "b").await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_one_role() {
        let mock = MockHttpClient::new();
        let store = InMemoryCredentialStore::new()
            .with_credential(Credential::new(Role::Shop, "s", None))
            .with_credential(Credential::new(Role::Customer, "c", None));
        let client = client(&mock, &store);

        client.logout(Role::Shop).await.unwrap();
        assert!(client.credential(Role::Shop).await.unwrap().is_none());
        assert!(client.credential(Role::Customer).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_is_token_valid_without_credential() {
        let mock = MockHttpClient::new();
        let store = InMemoryCredentialStore::new();
        assert!(!client(&mock, &store).is_token_valid(Role::Vendor).await.unwrap());
        assert!(mock.get_requests().is_empty());
    }

    #[test]
    fn test_shop_notifications_use_config() {
        let mock = MockHttpClient::new();
        let store = InMemoryCredentialStore::new();
        let notifications = client(&mock, &store).shop_notifications();
        assert!(notifications.shop_id().is_none());
    }
}
