//! In-memory credential store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::auth::{Credential, Role};
use crate::traits::credentials::ensure_slot;
use crate::traits::{CredentialStore, CredentialsError};

/// In-memory credential store for testing.
///
/// Slots live in a map keyed by role. Each operation can be told to fail,
/// and writes are counted so tests can assert how often the store changed.
///
/// # Example
///
/// ```ignore
/// use market_session::adapters::mock::InMemoryCredentialStore;
/// use market_session::auth::{Credential, Role};
///
/// let store = InMemoryCredentialStore::new()
///     .with_credential(Credential::new(Role::Shop, "expired", Some("refresh".into())));
///
/// assert!(store.get(Role::Customer).await?.is_none());
/// store.set_get_should_fail(true);
/// assert!(store.get(Role::Shop).await.is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    slots: Arc<Mutex<HashMap<Role, Credential>>>,
    get_should_fail: Arc<AtomicBool>,
    set_should_fail: Arc<AtomicBool>,
    clear_should_fail: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a credential into its role's slot.
    pub fn with_credential(self, credential: Credential) -> Self {
        self.slots().insert(credential.role, credential);
        self
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<Role, Credential>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read a slot without going through the async trait.
    pub fn peek(&self, role: Role) -> Option<Credential> {
        self.slots().get(&role).cloned()
    }

    /// Number of successful `set` and `clear` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Configure whether get should fail.
    pub fn set_get_should_fail(&self, should_fail: bool) {
        self.get_should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Configure whether set should fail.
    pub fn set_set_should_fail(&self, should_fail: bool) {
        self.set_should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Configure whether clear should fail.
    pub fn set_clear_should_fail(&self, should_fail: bool) {
        self.clear_should_fail.store(should_fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, role: Role) -> Result<Option<Credential>, CredentialsError> {
        if self.get_should_fail.load(Ordering::SeqCst) {
            return Err(CredentialsError::LoadFailed(
                "Mock load failure".to_string(),
            ));
        }
        Ok(self.peek(role))
    }

    async fn set(&self, role: Role, credential: Credential) -> Result<(), CredentialsError> {
        ensure_slot(role, &credential)?;
        if self.set_should_fail.load(Ordering::SeqCst) {
            return Err(CredentialsError::SaveFailed(
                "Mock save failure".to_string(),
            ));
        }
        self.slots().insert(role, credential);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self, role: Role) -> Result<(), CredentialsError> {
        if self.clear_should_fail.load(Ordering::SeqCst) {
            return Err(CredentialsError::ClearFailed(
                "Mock clear failure".to_string(),
            ));
        }
        self.slots().remove(&role);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
