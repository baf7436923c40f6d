//! Immutable description of one logical API call.

use serde::Serialize;

use super::idempotency::IdempotencyKey;
use crate::error::{SessionError, SessionResult};
use crate::traits::{Headers, HttpMethod};

/// Method, path, optional JSON body, extra headers and an optional
/// idempotency key. Cloning and re-issuing a descriptor sends the exact same
/// request, which is what the retry path relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: HttpMethod,
    path: String,
    body: Option<String>,
    headers: Headers,
    idempotency_key: Option<IdempotencyKey>,
}

impl RequestDescriptor {
    /// Build a descriptor. The path must be absolute (start with `/`).
    pub fn new(method: HttpMethod, path: impl Into<String>) -> SessionResult<Self> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(SessionError::InvalidDescriptor(format!(
                "path must start with '/': {:?}",
                path
            )));
        }
        Ok(Self {
            method,
            path,
            body: None,
            headers: Headers::new(),
            idempotency_key: None,
        })
    }

    pub fn get(path: impl Into<String>) -> SessionResult<Self> {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> SessionResult<Self> {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> SessionResult<Self> {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> SessionResult<Self> {
        Self::new(HttpMethod::Delete, path)
    }

    /// Attach a JSON body.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> SessionResult<Self> {
        self.body = Some(serde_json::to_string(body)?);
        Ok(self)
    }

    /// Attach an extra header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_relative_path() {
        let err = RequestDescriptor::get("orders/shop").unwrap_err();
        assert!(matches!(err, SessionError::InvalidDescriptor(_)));
        assert!(RequestDescriptor::get("").is_err());
    }

    #[test]
    fn test_builders() {
        let key = IdempotencyKey::new();
        let descriptor = RequestDescriptor::post("/orders")
            .unwrap()
            .with_json(&json!({"shopId": 3}))
            .unwrap()
            .with_header("X-Client", "console")
            .with_idempotency_key(key.clone());

        assert_eq!(descriptor.method(), HttpMethod::Post);
        assert_eq!(descriptor.path(), "/orders");
        assert_eq!(descriptor.body(), Some(r#"{"shopId":3}"#));
        assert_eq!(descriptor.headers().get("X-Client"), Some(&"console".to_string()));
        assert_eq!(descriptor.idempotency_key(), Some(&key));
    }

    #[test]
    fn test_clone_is_identical() {
        let descriptor = RequestDescriptor::put("/vendor-shops/shop/set-online")
            .unwrap()
            .with_json(&json!({"value": true}))
            .unwrap();
        assert_eq!(descriptor.clone(), descriptor);
    }
}
