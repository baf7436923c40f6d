//! Authenticated request execution.
//!
//! - [`RequestDescriptor`] describes one logical call
//! - [`RequestExecutor`] sends it once and wraps the result in a [`ResultEnvelope`]
//! - [`RetryPolicy`] refreshes and retries once on 401
//! - [`IdempotencyKeyGenerator`] keys state-changing calls

pub mod descriptor;
pub mod envelope;
pub mod executor;
pub mod idempotency;
pub mod retry;

pub use descriptor::RequestDescriptor;
pub use envelope::{ResultEnvelope, DEFAULT_FAILURE_MESSAGE};
pub use executor::{Attempt, RequestExecutor};
pub use idempotency::{CheckoutIntent, IdempotencyKey, IdempotencyKeyGenerator, IDEMPOTENCY_HEADER};
pub use retry::{AttemptBudget, Execution, RetryPolicy};
