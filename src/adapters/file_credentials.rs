//! File-based credential store adapter.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::auth::{Credential, CredentialsManager, Role};
use crate::traits::credentials::ensure_slot;
use crate::traits::{CredentialStore, CredentialsError};

/// File-based credential store.
///
/// Wraps [`CredentialsManager`]: one JSON file per role, replaced by an
/// atomic rename. Writers are serialized by an in-process lock; readers never
/// take it.
///
/// # Example
///
/// ```ignore
/// use market_session::adapters::FileCredentialStore;
/// use market_session::auth::{Credential, Role};
/// use market_session::traits::CredentialStore;
///
/// let store = FileCredentialStore::new()?;
/// store.set(Role::Shop, Credential::new(Role::Shop, token, refresh)).await?;
/// ```
#[derive(Debug)]
pub struct FileCredentialStore {
    manager: CredentialsManager,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store under `~/.market-session/credentials`.
    ///
    /// # Returns
    /// The store, or an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, CredentialsError> {
        CredentialsManager::new()
            .map(Self::with_manager)
            .ok_or_else(|| {
                CredentialsError::Other("Failed to determine home directory".to_string())
            })
    }

    /// Create a store under a custom directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self::with_manager(CredentialsManager::with_dir(dir))
    }

    fn with_manager(manager: CredentialsManager) -> Self {
        Self {
            manager,
            write_lock: Mutex::new(()),
        }
    }

    /// Get a reference to the underlying credentials manager.
    pub fn manager(&self) -> &CredentialsManager {
        &self.manager
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, role: Role) -> Result<Option<Credential>, CredentialsError> {
        Ok(self.manager.load(role))
    }

    async fn set(&self, role: Role, credential: Credential) -> Result<(), CredentialsError> {
        ensure_slot(role, &credential)?;
        let _guard = self.write_lock.lock().await;
        self.manager.save(&credential)?;
        tracing::debug!(role = %role, "Stored credential");
        Ok(())
    }

    async fn clear(&self, role: Role) -> Result<(), CredentialsError> {
        let _guard = self.write_lock.lock().await;
        self.manager.clear(role)?;
        tracing::debug!(role = %role, "Cleared credential");
        Ok(())
    }
}
