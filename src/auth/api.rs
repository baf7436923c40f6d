//! Client for the marketplace auth endpoints.
//!
//! - `POST {auth_base}/login/{role-segment}`
//! - `POST {auth_base}/refresh-token`
//! - `POST {auth_base}/is-token-valid`

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::Role;
use crate::request::envelope::{failure_message, parse_body};
use crate::traits::{Headers, HttpClient, HttpError};

/// Default base URL of the auth endpoints.
pub const DEFAULT_AUTH_BASE_URL: &str = "http://localhost:8080/api/v1/auth";

/// Error type for auth API operations.
#[derive(Debug)]
pub enum AuthApiError {
    /// HTTP request failed
    Http(HttpError),
    /// JSON deserialization failed
    Json(serde_json::Error),
    /// Server returned an error status
    ServerError { status: u16, message: String },
}

impl std::fmt::Display for AuthApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthApiError::Http(e) => write!(f, "HTTP error: {}", e),
            AuthApiError::Json(e) => write!(f, "JSON error: {}", e),
            AuthApiError::ServerError { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for AuthApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthApiError::Http(e) => Some(e),
            AuthApiError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HttpError> for AuthApiError {
    fn from(e: HttpError) -> Self {
        AuthApiError::Http(e)
    }
}

impl From<serde_json::Error> for AuthApiError {
    fn from(e: serde_json::Error) -> Self {
        AuthApiError::Json(e)
    }
}

/// Response from the login and refresh endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Client for the auth endpoints.
#[derive(Clone)]
pub struct AuthApi {
    base_url: String,
    http: Arc<dyn HttpClient>,
}

impl AuthApi {
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bearer_headers(token: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        headers
    }

    /// Sign in as a role.
    ///
    /// POST /login/{segment}
    pub async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, AuthApiError> {
        let url = format!("{}/login/{}", self.base_url, role.login_segment());
        let body = serde_json::to_string(&LoginRequest { email, password })?;

        let mut headers = Headers::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        let response = self.http.post(&url, &body, &headers).await?;
        if !response.is_success() {
            return Err(AuthApiError::ServerError {
                status: response.status,
                message: failure_message(parse_body(&response.body).as_ref()),
            });
        }

        Ok(response.json()?)
    }

    /// Exchange a refresh credential for a new token pair.
    ///
    /// POST /refresh-token with the credential as bearer and no body.
    pub async fn refresh(&self, bearer: &str) -> Result<TokenResponse, AuthApiError> {
        let url = format!("{}/refresh-token", self.base_url);
        let response = self
            .http
            .post(&url, "", &Self::bearer_headers(bearer))
            .await?;

        if !response.is_success() {
            return Err(AuthApiError::ServerError {
                status: response.status,
                message: failure_message(parse_body(&response.body).as_ref()),
            });
        }

        Ok(response.json()?)
    }

    /// Ask the server whether an access token is still accepted.
    ///
    /// POST /is-token-valid. Accepts a bare boolean or an object carrying
    /// the boolean in `data` or `valid`. A 401 or 403 reads as `false`.
    pub async fn is_token_valid(&self, token: &str) -> Result<bool, AuthApiError> {
        let url = format!("{}/is-token-valid", self.base_url);
        let response = self
            .http
            .post(&url, "", &Self::bearer_headers(token))
            .await?;

        if response.status == 401 || response.status == 403 {
            return Ok(false);
        }
        if !response.is_success() {
            return Err(AuthApiError::ServerError {
                status: response.status,
                message: failure_message(parse_body(&response.body).as_ref()),
            });
        }

        let value: serde_json::Value = response.json()?;
        let valid = value
            .as_bool()
            .or_else(|| value.get("data").and_then(serde_json::Value::as_bool))
            .or_else(|| value.get("valid").and_then(serde_json::Value::as_bool))
            .unwrap_or(false);
        Ok(valid)
    }
}

impl std::fmt::Debug for AuthApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthApi")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
