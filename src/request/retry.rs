//! One-shot retry after an authorization failure.

use super::descriptor::RequestDescriptor;
use super::envelope::ResultEnvelope;
use super::executor::RequestExecutor;
use crate::auth::{Credential, RefreshCoordinator, RefreshOutcome, Role};

/// Whether a logical request may still be retried after a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptBudget {
    Fresh,
    Retried,
}

/// Final result of a logical request.
#[derive(Debug, Clone)]
pub struct Execution {
    pub envelope: ResultEnvelope,
    /// Network attempts made: 1 or 2.
    pub attempts: u32,
    /// The credential could not be recovered and the role was signed out.
    pub signed_out: bool,
}

/// Wraps the executor with refresh-and-retry-once on 401.
///
/// A logical request is sent at most twice. Only a 401 triggers a refresh;
/// every other status, including 403, is returned as-is.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    executor: RequestExecutor,
    coordinator: RefreshCoordinator,
}

impl RetryPolicy {
    pub fn new(executor: RequestExecutor, coordinator: RefreshCoordinator) -> Self {
        Self {
            executor,
            coordinator,
        }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub async fn execute(&self, descriptor: &RequestDescriptor, role: Role) -> Execution {
        // Requests issued during a refresh go out with the refreshed token.
        self.coordinator.await_pending(role).await;

        let mut budget = AttemptBudget::Fresh;
        let mut attempts = 0;
        let mut refreshed: Option<Credential> = None;

        loop {
            let attempt = match &refreshed {
                Some(credential) => self.executor.execute_with(descriptor, Some(credential)).await,
                None => self.executor.execute(descriptor, role).await,
            };
            attempts += 1;

            if !attempt.envelope.is_unauthorized() || budget == AttemptBudget::Retried {
                return Execution {
                    envelope: attempt.envelope,
                    attempts,
                    signed_out: false,
                };
            }

            match self.coordinator.refresh(role, attempt.token.as_deref()).await {
                RefreshOutcome::Refreshed(credential) => {
                    tracing::debug!(role = %role, path = %descriptor.path(), "Retrying after refresh");
                    budget = AttemptBudget::Retried;
                    refreshed = Some(credential);
                }
                RefreshOutcome::ReauthRequired => {
                    return Execution {
                        envelope: attempt.envelope,
                        attempts,
                        signed_out: true,
                    };
                }
            }
        }
    }
}
