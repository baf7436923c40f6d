//! Crate-level error type.
//!
//! Business failures (4xx/5xx, unreachable network) never show up here: they
//! are folded into a [`ResultEnvelope`](crate::request::ResultEnvelope). This
//! type covers programming mistakes and session setup failures.

use thiserror::Error;

use crate::traits::CredentialsError;

/// Errors surfaced by the session layer outside the result envelope.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A request descriptor was built with invalid parts.
    #[error("Invalid request descriptor: {0}")]
    InvalidDescriptor(String),

    /// A role name could not be parsed.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Configuration could not be read or is malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The credential store failed.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// The auth endpoint rejected a login.
    #[error("Login rejected ({status}): {message}")]
    LoginRejected { status: u16, message: String },

    /// The auth endpoint could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A request body could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::InvalidDescriptor(_) => "E_SESSION_DESCRIPTOR",
            SessionError::UnknownRole(_) => "E_SESSION_ROLE",
            SessionError::Config(_) => "E_SESSION_CONFIG",
            SessionError::Credentials(_) => "E_SESSION_CREDENTIALS",
            SessionError::LoginRejected { .. } => "E_SESSION_LOGIN",
            SessionError::Transport(_) => "E_SESSION_TRANSPORT",
            SessionError::Serialization(_) => "E_SESSION_SERDE",
        }
    }

    /// Whether the user has to sign in again to recover.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, SessionError::LoginRejected { status: 401, .. })
    }
}
