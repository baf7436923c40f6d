//! Mock HTTP client for testing.
//!
//! Provides a configurable mock HTTP client that can return predefined
//! responses or errors for testing purposes.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::traits::{Headers, HttpClient, HttpError, HttpMethod, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a response with any status code
    Success(Response),
    /// Fail at the transport level
    Error(HttpError),
    /// Wait before producing the inner response
    Delayed(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        MockResponse::Delayed(delay, Box::new(inner))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock HTTP client for testing.
///
/// Responses are looked up per URL: first a one-shot queue, then the fixed
/// response for the URL, then a prefix match, then the default.
///
/// # Example
///
/// ```ignore
/// use market_session::adapters::mock::{MockHttpClient, MockResponse};
/// use market_session::traits::{HttpClient, Response, Headers};
///
/// let client = MockHttpClient::new();
/// client.push_response(
///     "http://localhost:8080/api/v1/orders/shop",
///     MockResponse::Success(Response::new(401, Bytes::new())),
/// );
/// client.set_response(
///     "http://localhost:8080/api/v1/orders/shop",
///     MockResponse::Success(Response::new(200, Bytes::from("[]"))),
/// );
///
/// // First call sees the 401, every later call the 200.
/// ```
#[derive(Debug, Clone)]
pub struct MockHttpClient {
    /// Configured responses by URL pattern
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    /// One-shot responses consumed before the fixed ones
    queued: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    /// Default response when no specific match
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            queued: Arc::new(Mutex::new(HashMap::new())),
            default_response: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the response for a URL (or URL prefix).
    pub fn set_response(&self, url: &str, response: MockResponse) {
        lock(&self.responses).insert(url.to_string(), response);
    }

    /// Queue a response returned once for an exact URL.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        lock(&self.queued)
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        *lock(&self.default_response) = Some(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Recorded requests for one URL.
    pub fn requests_to(&self, url: &str) -> Vec<RecordedRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }

    fn record_request(&self, method: HttpMethod, url: &str, headers: &Headers, body: Option<&str>) {
        lock(&self.requests).push(RecordedRequest {
            method,
            url: url.to_string(),
            headers: headers.clone(),
            body: body.map(str::to_string),
        });
    }

    fn get_response(&self, url: &str) -> Option<MockResponse> {
        if let Some(queue) = lock(&self.queued).get_mut(url) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }

        let responses = lock(&self.responses);

        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }

        // Then try prefix match (for URL patterns)
        for (pattern, response) in responses.iter() {
            if url.starts_with(pattern) {
                return Some(response.clone());
            }
        }

        lock(&self.default_response).clone()
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&str>,
        headers: &Headers,
    ) -> Result<Response, HttpError> {
        self.record_request(method, url, headers, body);

        let mut next = self.get_response(url);
        loop {
            match next {
                Some(MockResponse::Success(response)) => return Ok(response),
                Some(MockResponse::Error(err)) => return Err(err),
                Some(MockResponse::Delayed(delay, inner)) => {
                    tokio::time::sleep(delay).await;
                    next = Some(*inner);
                }
                None => {
                    return Err(HttpError::Other(format!("No mock response for URL: {}", url)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_mock_http_client_new() {
        let client = MockHttpClient::new();
        assert!(client.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_get_with_response() {
        let client = MockHttpClient::new();
        client.set_response(
            "http://api.test/data",
            MockResponse::Success(Response::new(200, Bytes::from("Hello"))),
        );

        let response = client.get("http://api.test/data", &Headers::new()).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.text().unwrap(), "Hello");

        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert!(requests[0].body.is_none());
    }

    #[tokio::test]
    async fn test_queued_responses_come_first() {
        let client = MockHttpClient::new();
        let url = "http://api.test/orders";
        client.push_response(url, MockResponse::Success(Response::new(401, Bytes::new())));
        client.set_response(url, MockResponse::Success(Response::new(200, Bytes::new())));

        let first = client.get(url, &Headers::new()).await.unwrap();
        let second = client.get(url, &Headers::new()).await.unwrap();
        assert_eq!(first.status, 401);
        assert_eq!(second.status, 200);
    }

    #[tokio::test]
    async fn test_error_response() {
        let client = MockHttpClient::new();
        client.set_response(
            "http://api.test/down",
            MockResponse::Error(HttpError::ConnectionFailed("refused".to_string())),
        );

        let result = client.post("http://api.test/down", "{}", &Headers::new()).await;
        assert!(matches!(result, Err(HttpError::ConnectionFailed(_))));
        assert_eq!(client.get_requests()[0].body.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_prefix_and_default() {
        let client = MockHttpClient::new();
        client.set_response(
            "http://api.test/cart",
            MockResponse::Success(Response::new(200, Bytes::new())),
        );
        client.set_default_response(MockResponse::Success(Response::new(404, Bytes::new())));

        let cart = client.get("http://api.test/cart/get-cart", &Headers::new()).await.unwrap();
        assert_eq!(cart.status, 200);
        let other = client.get("http://api.test/elsewhere", &Headers::new()).await.unwrap();
        assert_eq!(other.status, 404);
    }

    #[tokio::test]
    async fn test_no_response_configured() {
        let client = MockHttpClient::new();
        let result = client.get("http://api.test/missing", &Headers::new()).await;
        assert!(matches!(result, Err(HttpError::Other(_))));
    }

    #[tokio::test]
    async fn test_delayed_response() {
        let client = MockHttpClient::new();
        client.set_response(
            "http://api.test/slow",
            MockResponse::delayed(
                Duration::from_millis(50),
                MockResponse::Success(Response::new(204, Bytes::new())),
            ),
        );

        let started = std::time::Instant::now();
        let response = client.get("http://api.test/slow", &Headers::new()).await.unwrap();
        assert_eq!(response.status, 204);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
