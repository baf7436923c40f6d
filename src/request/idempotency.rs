//! Idempotency keys for state-changing requests.
//!
//! The server discards a request whose key it has already processed, so a
//! retried checkout can never create a second order.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Header carrying the key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// A UUID v4 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generate a fresh random key.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdempotencyKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces idempotency keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyKeyGenerator;

impl IdempotencyKeyGenerator {
    pub fn generate() -> IdempotencyKey {
        IdempotencyKey::new()
    }
}

/// One user checkout intent.
///
/// Holds a single key for as long as the user is on the same checkout. Every
/// submission of that intent (including retries and repeated clicks) carries
/// the same key; a new key only comes from [`restart`](Self::restart).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutIntent {
    key: IdempotencyKey,
}

impl CheckoutIntent {
    pub fn begin() -> Self {
        Self {
            key: IdempotencyKeyGenerator::generate(),
        }
    }

    pub fn key(&self) -> &IdempotencyKey {
        &self.key
    }

    /// Start a new checkout attempt with a fresh key.
    pub fn restart(&mut self) -> &IdempotencyKey {
        self.key = IdempotencyKeyGenerator::generate();
        tracing::debug!(key = %self.key, "Checkout intent restarted");
        &self.key
    }
}

impl Default for CheckoutIntent {
    fn default() -> Self {
        Self::begin()
    }
}
