//! Single-flight credential refresh.
//!
//! One in-flight record per role. The first 401 for a role starts a refresh
//! on a spawned task; every other 401 for that role while it runs awaits the
//! same record. A 401 for a token that has already been replaced is answered
//! from the store without another refresh call.
//!
//! Login and logout go through [`RefreshCoordinator::replace`], which bumps
//! the role's generation. A refresh started under an older generation never
//! writes to or clears the slot; its waiters get whatever the slot holds now.
//!
//! ```text
//! Idle --401--> Refreshing --ok--> Idle
//!                    |
//!                    +--fail--> Failed (slot cleared, SignOut broadcast)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, Notify, OnceCell};

use super::{AuthApi, Credential, Role};
use crate::traits::{CredentialStore, CredentialsError};

const SIGN_OUT_CAPACITY: usize = 16;

/// Per-role refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
    Failed,
}

/// What every waiter of one refresh receives.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Refreshed(Credential),
    ReauthRequired,
}

/// Broadcast when a role's session could not be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOut {
    pub role: Role,
}

struct InFlightRefresh {
    result: OnceCell<RefreshOutcome>,
    notify: Notify,
}

impl InFlightRefresh {
    fn new() -> Self {
        Self {
            result: OnceCell::new(),
            notify: Notify::new(),
        }
    }

    fn set_result(&self, outcome: RefreshOutcome) {
        let _ = self.result.set(outcome);
        self.notify.notify_waiters();
    }

    async fn wait(&self) -> RefreshOutcome {
        loop {
            if let Some(outcome) = self.result.get() {
                return outcome.clone();
            }

            let notified = self.notify.notified();
            if let Some(outcome) = self.result.get() {
                return outcome.clone();
            }

            notified.await;
        }
    }
}

#[derive(Default)]
struct Slot {
    state: RefreshState,
    in_flight: Option<Arc<InFlightRefresh>>,
    generation: u64,
}

struct Shared {
    api: AuthApi,
    store: Arc<dyn CredentialStore>,
    slots: Mutex<HashMap<Role, Slot>>,
    sign_out: broadcast::Sender<SignOut>,
    refresh_calls: AtomicUsize,
}

/// Role-parameterized single-flight refresh.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    pub fn new(api: AuthApi, store: Arc<dyn CredentialStore>) -> Self {
        let (sign_out, _) = broadcast::channel(SIGN_OUT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                api,
                store,
                slots: Mutex::new(HashMap::new()),
                sign_out,
                refresh_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to forced sign-outs.
    pub fn sign_outs(&self) -> broadcast::Receiver<SignOut> {
        self.shared.sign_out.subscribe()
    }

    pub async fn state(&self, role: Role) -> RefreshState {
        self.shared
            .slots
            .lock()
            .await
            .get(&role)
            .map(|slot| slot.state)
            .unwrap_or_default()
    }

    /// Number of refresh calls sent to the auth endpoint.
    pub fn refresh_count(&self) -> usize {
        self.shared.refresh_calls.load(Ordering::SeqCst)
    }

    /// Store a new session for `role`, or clear it with `None`.
    ///
    /// Any refresh still running for the role is detached: it keeps its
    /// waiters but its result is never written back. The role returns to
    /// `Idle`.
    pub async fn replace(
        &self,
        role: Role,
        credential: Option<Credential>,
    ) -> Result<(), CredentialsError> {
        let mut slots = self.shared.slots.lock().await;
        let slot = slots.entry(role).or_default();
        slot.generation += 1;
        slot.state = RefreshState::Idle;
        if slot.in_flight.take().is_some() {
            tracing::debug!(role = %role, "Detached in-flight refresh");
        }

        match credential {
            Some(credential) => self.shared.store.set(role, credential).await,
            None => self.shared.store.clear(role).await,
        }
    }

    /// Wait for the role's in-flight refresh, if there is one.
    pub async fn await_pending(&self, role: Role) {
        let flight = {
            let slots = self.shared.slots.lock().await;
            slots.get(&role).and_then(|slot| slot.in_flight.clone())
        };
        if let Some(flight) = flight {
            tracing::debug!(role = %role, "Waiting for in-flight refresh");
            flight.wait().await;
        }
    }

    /// Recover from a 401 received with `used_token`.
    ///
    /// Joins the in-flight refresh for the role or starts one. If the store
    /// already holds a different access token, returns it without refreshing.
    pub async fn refresh(&self, role: Role, used_token: Option<&str>) -> RefreshOutcome {
        let flight = {
            let mut slots = self.shared.slots.lock().await;
            let slot = slots.entry(role).or_default();

            if let Some(flight) = slot.in_flight.clone() {
                tracing::debug!(role = %role, "Joining in-flight refresh");
                flight
            } else {
                if let Some(current) = self.newer_credential(role, used_token).await {
                    tracing::debug!(role = %role, "Credential already refreshed");
                    return RefreshOutcome::Refreshed(current);
                }

                let flight = Arc::new(InFlightRefresh::new());
                slot.in_flight = Some(Arc::clone(&flight));
                slot.state = RefreshState::Refreshing;
                let generation = slot.generation;
                tracing::info!(role = %role, "Refreshing credential");

                let coordinator = self.clone();
                let leader_flight = Arc::clone(&flight);
                tokio::spawn(async move {
                    coordinator.run_refresh(role, leader_flight, generation).await;
                });
                flight
            }
        };

        flight.wait().await
    }

    async fn newer_credential(&self, role: Role, used_token: Option<&str>) -> Option<Credential> {
        let used_token = used_token?;
        match self.shared.store.get(role).await {
            Ok(Some(current)) if current.access_token != used_token => Some(current),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(role = %role, "Credential store read failed: {}", e);
                None
            }
        }
    }

    async fn run_refresh(&self, role: Role, flight: Arc<InFlightRefresh>, generation: u64) {
        let outcome = self.perform(role, generation).await;

        {
            let mut slots = self.shared.slots.lock().await;
            let slot = slots.entry(role).or_default();
            if slot
                .in_flight
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &flight))
            {
                slot.in_flight = None;
                slot.state = match outcome {
                    RefreshOutcome::Refreshed(_) => RefreshState::Idle,
                    RefreshOutcome::ReauthRequired => RefreshState::Failed,
                };
            }
        }

        flight.set_result(outcome);
    }

    async fn perform(&self, role: Role, generation: u64) -> RefreshOutcome {
        let current = match self.shared.store.get(role).await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                tracing::warn!(role = %role, "No credential to refresh");
                return RefreshOutcome::ReauthRequired;
            }
            Err(e) => {
                tracing::warn!(role = %role, "Credential store read failed: {}", e);
                return self.fail(role, generation).await;
            }
        };

        self.shared.refresh_calls.fetch_add(1, Ordering::SeqCst);
        match self.shared.api.refresh(current.refresh_bearer()).await {
            Ok(tokens) => {
                let next = current.refreshed(tokens.access_token, tokens.refresh_token);
                self.commit(role, generation, next).await
            }
            Err(e) => {
                tracing::warn!(role = %role, "Credential refresh failed: {}", e);
                self.fail(role, generation).await
            }
        }
    }

    /// Store the refreshed credential unless the session was replaced while
    /// the refresh ran.
    async fn commit(&self, role: Role, generation: u64, next: Credential) -> RefreshOutcome {
        let slots = self.shared.slots.lock().await;
        if !is_current(&slots, role, generation) {
            drop(slots);
            tracing::info!(role = %role, "Session replaced during refresh, discarding result");
            return self.stored_outcome(role).await;
        }

        if let Err(e) = self.shared.store.set(role, next.clone()).await {
            tracing::warn!(role = %role, "Refreshed credential could not be stored: {}", e);
        }
        tracing::info!(role = %role, "Credential refreshed");
        RefreshOutcome::Refreshed(next)
    }

    /// Clear the role's slot and announce the sign-out, unless the session
    /// was replaced while the refresh ran.
    async fn fail(&self, role: Role, generation: u64) -> RefreshOutcome {
        let slots = self.shared.slots.lock().await;
        if !is_current(&slots, role, generation) {
            drop(slots);
            tracing::info!(role = %role, "Session replaced during refresh, not signing out");
            return self.stored_outcome(role).await;
        }

        if let Err(e) = self.shared.store.clear(role).await {
            tracing::error!(role = %role, "Failed to clear credential after refresh failure: {}", e);
        }
        tracing::warn!(role = %role, "Signing out");
        let _ = self.shared.sign_out.send(SignOut { role });
        RefreshOutcome::ReauthRequired
    }

    async fn stored_outcome(&self, role: Role) -> RefreshOutcome {
        match self.shared.store.get(role).await {
            Ok(Some(credential)) => RefreshOutcome::Refreshed(credential),
            _ => RefreshOutcome::ReauthRequired,
        }
    }
}

fn is_current(slots: &HashMap<Role, Slot>, role: Role, generation: u64) -> bool {
    slots.get(&role).map_or(0, |slot| slot.generation) == generation
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_calls", &self.refresh_count())
            .finish_non_exhaustive()
    }
}
