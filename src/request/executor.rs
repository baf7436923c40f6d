//! Single-attempt request execution.

use std::sync::Arc;

use super::descriptor::RequestDescriptor;
use super::envelope::ResultEnvelope;
use super::idempotency::IDEMPOTENCY_HEADER;
use crate::auth::{Credential, Role};
use crate::traits::{CredentialStore, Headers, HttpClient};

/// Result of one network attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub envelope: ResultEnvelope,
    /// Access token the request carried, if any. Lets the refresh layer tell
    /// a stale 401 from a fresh one.
    pub token: Option<String>,
}

/// Issues one call with the role's credential attached and classifies the
/// outcome. Never retries.
#[derive(Clone)]
pub struct RequestExecutor {
    base_url: String,
    http: Arc<dyn HttpClient>,
    store: Arc<dyn CredentialStore>,
}

impl RequestExecutor {
    pub fn new(
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            store,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, descriptor: &RequestDescriptor) -> String {
        format!("{}{}", self.base_url, descriptor.path())
    }

    /// Execute with the credential currently stored for `role`.
    ///
    /// A store read failure is logged and the request goes out without a
    /// credential.
    pub async fn execute(&self, descriptor: &RequestDescriptor, role: Role) -> Attempt {
        let credential = match self.store.get(role).await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(role = %role, "Credential store read failed: {}", e);
                None
            }
        };
        self.execute_with(descriptor, credential.as_ref()).await
    }

    /// Execute with an explicit credential.
    pub async fn execute_with(
        &self,
        descriptor: &RequestDescriptor,
        credential: Option<&Credential>,
    ) -> Attempt {
        let token = credential.map(|c| c.access_token.clone());
        let headers = Self::headers_for(descriptor, token.as_deref());
        let url = self.url_for(descriptor);

        tracing::debug!(method = %descriptor.method(), url = %url, "Sending request");

        let envelope = match self
            .http
            .send(descriptor.method(), &url, descriptor.body(), &headers)
            .await
        {
            Ok(response) => ResultEnvelope::from_response(&response),
            Err(e) => {
                tracing::warn!(method = %descriptor.method(), url = %url, "Request failed: {}", e);
                ResultEnvelope::network_error(&e)
            }
        };

        tracing::debug!(url = %url, status = envelope.status, "Request completed");
        Attempt { envelope, token }
    }

    fn headers_for(descriptor: &RequestDescriptor, token: Option<&str>) -> Headers {
        let mut headers = descriptor.headers().clone();
        if let Some(token) = token {
            set_header(&mut headers, "Authorization", format!("Bearer {}", token));
        }
        if descriptor.body().is_some() {
            set_header(&mut headers, "Content-Type", "application/json".to_string());
        }
        if let Some(key) = descriptor.idempotency_key() {
            set_header(&mut headers, IDEMPOTENCY_HEADER, key.to_string());
        }
        headers
    }
}

/// Insert `name`, replacing any existing spelling of it. Header names are
/// case-insensitive on the wire.
fn set_header(headers: &mut Headers, name: &str, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
