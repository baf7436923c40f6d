//! Uniform success/failure wrapper returned by every executed request.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::traits::{HttpError, Response};

/// Fallback message for a failed response without `message` or `error`.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";

/// Outcome of one executed request.
///
/// `status == 0` means the request never got a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    pub status: u16,
    pub message: String,
    pub data: Option<Value>,
}

impl ResultEnvelope {
    /// Classify a transport response.
    pub fn from_response(response: &Response) -> Self {
        let body = parse_body(&response.body);

        if !response.is_success() {
            return Self {
                status: response.status,
                message: failure_message(body.as_ref()),
                data: None,
            };
        }

        let message = body
            .as_ref()
            .and_then(|v| string_field(v, "message"))
            .unwrap_or_else(|| canonical_reason(response.status).to_string());

        Self {
            status: response.status,
            message,
            data: body,
        }
    }

    /// Envelope for a request that never got a response.
    pub fn network_error(err: &HttpError) -> Self {
        Self {
            status: 0,
            message: format!("Network error: {}", err),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_network_error(&self) -> bool {
        self.status == 0
    }

    /// Deserialize the payload into a typed value.
    ///
    /// Returns `None` when there is no payload.
    pub fn parse_data<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.data.clone().map(serde_json::from_value)
    }
}

/// Message for a non-2xx body: `message`, then `error`, then the default.
pub(crate) fn failure_message(body: Option<&Value>) -> String {
    body.and_then(|v| string_field(v, "message").or_else(|| string_field(v, "error")))
        .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string())
}

/// Parse a body as JSON. Empty bodies are `None`; non-JSON text is kept as a
/// JSON string.
pub(crate) fn parse_body(body: &[u8]) -> Option<Value> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn canonical_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Success")
}
