//! Credential store trait abstraction.
//!
//! One slot per [`Role`]. Slots never share state: writing or clearing one
//! role leaves every other role untouched.

use async_trait::async_trait;

use crate::auth::{Credential, Role};

/// Credential storage errors.
#[derive(Debug, Clone)]
pub enum CredentialsError {
    /// Failed to load credentials
    LoadFailed(String),
    /// Failed to save credentials
    SaveFailed(String),
    /// Failed to clear credentials
    ClearFailed(String),
    /// Credentials not found
    NotFound,
    /// A credential was written to another role's slot
    RoleMismatch { slot: Role, credential: Role },
    /// IO error
    Io(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Other error
    Other(String),
}

impl std::fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialsError::LoadFailed(msg) => write!(f, "Failed to load credentials: {}", msg),
            CredentialsError::SaveFailed(msg) => write!(f, "Failed to save credentials: {}", msg),
            CredentialsError::ClearFailed(msg) => {
                write!(f, "Failed to clear credentials: {}", msg)
            }
            CredentialsError::NotFound => write!(f, "Credentials not found"),
            CredentialsError::RoleMismatch { slot, credential } => write!(
                f,
                "Credential for role '{}' cannot be stored in the '{}' slot",
                credential, slot
            ),
            CredentialsError::Io(msg) => write!(f, "IO error: {}", msg),
            CredentialsError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            CredentialsError::Other(msg) => write!(f, "Credentials error: {}", msg),
        }
    }
}

impl std::error::Error for CredentialsError {}

/// Per-role credential storage.
///
/// Implementations must survive a process restart (the file store does) and
/// must replace a slot atomically on `set`.
///
/// # Example
///
/// ```ignore
/// use market_session::auth::{Credential, Role};
/// use market_session::traits::CredentialStore;
///
/// async fn bearer<S: CredentialStore>(store: &S) -> Option<String> {
///     store.get(Role::Shop).await.ok().flatten().map(|c| c.access_token)
/// }
/// ```
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the credential for a role.
    ///
    /// # Returns
    /// - `Ok(Some(credential))` if the slot holds a credential
    /// - `Ok(None)` if the slot is empty
    /// - `Err(error)` if the store could not be read
    async fn get(&self, role: Role) -> Result<Option<Credential>, CredentialsError>;

    /// Replace the credential for a role.
    ///
    /// The credential's own role must match `role`.
    async fn set(&self, role: Role, credential: Credential) -> Result<(), CredentialsError>;

    /// Remove the credential for a role. Clearing an empty slot is not an error.
    async fn clear(&self, role: Role) -> Result<(), CredentialsError>;
}

/// Reject a credential whose role does not match the target slot.
pub(crate) fn ensure_slot(role: Role, credential: &Credential) -> Result<(), CredentialsError> {
    if credential.role != role {
        return Err(CredentialsError::RoleMismatch {
            slot: role,
            credential: credential.role,
        });
    }
    Ok(())
}
