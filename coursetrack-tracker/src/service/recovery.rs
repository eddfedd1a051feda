//! Recovery dispatcher
//!
//! Turns a user-chosen recovery action into exactly one control command.
//! Concurrent requests for the same job and action are refused while the
//! first one is in flight.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use coursetrack_core::domain::health::RecoveryAction;
use coursetrack_core::dto::job::ControlOutcome;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{Eligibility, RecoveryError};
use crate::health::{HealthPolicy, project};
use crate::repository::JobRepository;
use crate::service::notifications::NotificationAggregator;
use crate::store::JobStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operation {
    Recover(RecoveryAction),
    Dismiss,
}

type InFlight = Mutex<HashSet<(Uuid, Operation)>>;

/// Holds an in-flight slot until dropped
struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    key: (Uuid, Operation),
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a InFlight, key: (Uuid, Operation)) -> Option<Self> {
        let mut slots = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !slots.insert(key) {
            return None;
        }
        Some(Self { in_flight, key })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

/// Dispatches recovery and dismiss commands for one owner's jobs
pub struct RecoveryDispatcher {
    store: Arc<JobStore>,
    repository: Arc<dyn JobRepository>,
    notifications: Arc<NotificationAggregator>,
    policy: HealthPolicy,
    in_flight: InFlight,
}

impl RecoveryDispatcher {
    pub fn new(
        store: Arc<JobStore>,
        repository: Arc<dyn JobRepository>,
        notifications: Arc<NotificationAggregator>,
        policy: HealthPolicy,
    ) -> Self {
        Self {
            store,
            repository,
            notifications,
            policy,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a command for this job and action is awaiting its response
    pub fn is_in_flight(&self, job_id: Uuid, action: RecoveryAction) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(job_id, Operation::Recover(action)))
    }

    /// Sends one recovery command for a job
    ///
    /// Resume and restart are only sent for stalled, stuck or failed jobs.
    /// Delete is always permitted and removes the job locally once confirmed.
    pub async fn dispatch(&self, job_id: Uuid, action: RecoveryAction) -> Result<(), RecoveryError> {
        if action.requires_attention() {
            self.check_eligible(job_id)?;
        }

        let _guard = InFlightGuard::acquire(&self.in_flight, (job_id, Operation::Recover(action)))
            .ok_or(RecoveryError::AlreadyInProgress { job_id, action })?;

        info!("Dispatching {} for job {}", action, job_id);

        let result = match self.repository.control(job_id, action).await {
            Ok(ControlOutcome { success: true, .. }) => Ok(()),
            Ok(ControlOutcome { error, .. }) => Err(RecoveryError::Rejected {
                job_id,
                action,
                message: error.unwrap_or_else(|| "rejected by control API".to_string()),
            }),
            Err(source) => Err(RecoveryError::Client {
                job_id,
                action,
                source,
            }),
        };

        match result {
            Ok(()) => {
                info!("{} confirmed for job {}", action, job_id);
                if action == RecoveryAction::Delete {
                    self.store.remove(job_id);
                }
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                self.notifications
                    .recovery_failed(job_id, action, e.to_string());
                Err(e)
            }
        }
    }

    /// Clears a job from the active view
    pub async fn dismiss(&self, job_id: Uuid) -> Result<(), RecoveryError> {
        let job = self
            .store
            .get(job_id)
            .ok_or(RecoveryError::UnknownJob(job_id))?;

        let _guard = InFlightGuard::acquire(&self.in_flight, (job_id, Operation::Dismiss))
            .ok_or(RecoveryError::DismissInProgress(job_id))?;

        let message = match self.repository.clear(job_id).await {
            Ok(ControlOutcome { success: true, .. }) => None,
            Ok(ControlOutcome { error, .. }) => {
                Some(error.unwrap_or_else(|| "rejected by control API".to_string()))
            }
            Err(e) => Some(e.to_string()),
        };

        if let Some(message) = message {
            error!("Failed to dismiss job {}: {}", job_id, message);
            return Err(RecoveryError::DismissFailed { job_id, message });
        }

        // Same updated_at as the stored row, so the merge rule lets it through.
        let mut cleared = self.store.get(job_id).unwrap_or(job);
        cleared.is_cleared = true;
        self.store.upsert(cleared);

        info!("Dismissed job {}", job_id);
        self.notifications.dismissed(job_id);
        Ok(())
    }

    fn check_eligible(&self, job_id: Uuid) -> Result<(), RecoveryError> {
        let job = self
            .store
            .get(job_id)
            .ok_or(RecoveryError::UnknownJob(job_id))?;

        match project(&job, Utc::now(), &self.policy).health {
            Some(health) if health.needs_attention() => Ok(()),
            Some(health) => Err(RecoveryError::NotEligible {
                job_id,
                health: Eligibility::Classified(health),
            }),
            None => Err(RecoveryError::NotEligible {
                job_id,
                health: Eligibility::Unclassified,
            }),
        }
    }
}
