//! Error handling for the session layer.
//!
//! Two kinds of failure exist here:
//!
//! - **Business failures** (HTTP 4xx/5xx, unreachable network) are never
//!   errors. They come back inside a [`ResultEnvelope`](crate::request::ResultEnvelope)
//!   so the UI can decide what to show.
//! - **Programming and setup failures** (malformed descriptor, bad config,
//!   broken credential storage) are [`SessionError`]s.
//!
//! Seam-specific errors live next to their traits: [`HttpError`](crate::traits::HttpError),
//! [`CredentialsError`](crate::traits::CredentialsError) and
//! [`WsError`](crate::traits::WsError).

mod result;
mod session_error;

pub use result::SessionResult;
pub use session_error::SessionError;
