//! Notification aggregator
//!
//! Watches job store transitions and connection changes and turns them into
//! one-shot notifications for the UI. Per-job transitions are gated by the
//! marker store, so each fires at most once even across reloads.
//!
//! A job first seen already finished is announced only if an earlier session
//! watched it while it was still active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use coursetrack_core::domain::health::RecoveryAction;
use coursetrack_core::domain::job::{Job, JobStatus};
use coursetrack_core::domain::notification::{Notification, TransitionKind};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::health::{HealthPolicy, JobProjection, project};
use crate::repository::MarkerStore;
use crate::store::StoreObserver;

const NOTIFICATION_CAPACITY: usize = 64;

/// Derives user-facing events from store diffs and connection signals
pub struct NotificationAggregator {
    markers: Arc<dyn MarkerStore>,
    policy: HealthPolicy,
    sender: broadcast::Sender<Notification>,
    /// Holds everything emitted before the first subscriber arrives
    backlog: Mutex<Option<broadcast::Receiver<Notification>>>,
    connection_degraded: AtomicBool,
}

impl NotificationAggregator {
    pub fn new(markers: Arc<dyn MarkerStore>, policy: HealthPolicy) -> Self {
        let (sender, backlog) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            markers,
            policy,
            sender,
            backlog: Mutex::new(Some(backlog)),
            connection_degraded: AtomicBool::new(false),
        }
    }

    /// Receives every notification emitted from now on
    ///
    /// The first subscriber also receives what was emitted before it
    /// subscribed, such as completions found by the initial load.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.backlog
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .unwrap_or_else(|| self.sender.subscribe())
    }

    /// Push retries exhausted; raises the banner once until restored
    pub fn connection_degraded(&self) {
        if !self.connection_degraded.swap(true, Ordering::SeqCst) {
            self.emit(Notification::ConnectionDegraded);
        }
    }

    /// Push channel subscribed; clears the banner if it was raised
    pub fn connection_restored(&self) {
        if self.connection_degraded.swap(false, Ordering::SeqCst) {
            self.emit(Notification::ConnectionRestored);
        }
    }

    pub fn is_connection_degraded(&self) -> bool {
        self.connection_degraded.load(Ordering::SeqCst)
    }

    pub fn fetch_failed(&self, consecutive_failures: u32, message: String) {
        self.emit(Notification::FetchFailed {
            consecutive_failures,
            message,
        });
    }

    pub fn recovery_failed(&self, job_id: Uuid, action: RecoveryAction, message: String) {
        self.emit(Notification::RecoveryFailed {
            job_id,
            action,
            message,
        });
    }

    pub fn dismissed(&self, job_id: Uuid) {
        self.emit(Notification::Dismissed { job_id });
    }

    fn emit(&self, notification: Notification) {
        debug!("Emitting notification {:?}", notification);
        // No receivers is fine: nobody is listening anymore.
        let _ = self.sender.send(notification);
    }

    /// Emits `notification` only if the marker was not recorded yet
    fn emit_once(&self, job_id: Uuid, kind: TransitionKind, notification: Notification) {
        match self.markers.record(job_id, kind) {
            Ok(true) => self.emit(notification),
            Ok(false) => debug!("Already notified {} for job {}", kind, job_id),
            Err(e) => warn!("Failed to record {} marker for job {}: {}", kind, job_id, e),
        }
    }

    fn mark_observed_active(&self, job_id: Uuid) {
        if let Err(e) = self.markers.record(job_id, TransitionKind::ObservedActive) {
            warn!("Failed to record activity of job {}: {}", job_id, e);
        }
    }

    fn announce_completed(&self, job: &Job, after: &JobProjection) {
        info!("Job {} completed", job.id);
        self.emit_once(
            job.id,
            TransitionKind::Completed,
            Notification::Completed {
                job_id: job.id,
                success_rate: after.success_rate,
            },
        );
    }

    fn announce_partial(&self, job: &Job, after: &JobProjection) {
        let finished = after.effectively_complete || after.effective_status == JobStatus::Completed;
        if !finished {
            return;
        }

        if let Some(rate) = after.success_rate.filter(|rate| *rate < 1.0) {
            info!("Job {} finished with success rate {:.2}", job.id, rate);
            self.emit_once(
                job.id,
                TransitionKind::PartialCompletion,
                Notification::PartialCompletion {
                    job_id: job.id,
                    success_rate: rate,
                },
            );
        }
    }

    fn observe_first_sighting(&self, current: &Job) {
        let after = project(current, Utc::now(), &self.policy);

        if after.effective_status.is_active() {
            self.mark_observed_active(current.id);
            return;
        }

        if !self.markers.contains(current.id, TransitionKind::ObservedActive) {
            return;
        }

        debug!("Job {} finished while nobody was watching", current.id);
        if after.effective_status == JobStatus::Completed {
            self.announce_completed(current, &after);
        }
        self.announce_partial(current, &after);
    }

    fn observe_transition(&self, previous: &Job, current: &Job) {
        let now = Utc::now();
        let before = project(previous, now, &self.policy);
        let after = project(current, now, &self.policy);

        if after.effective_status.is_active() {
            self.mark_observed_active(current.id);
        }

        if before.effective_status != JobStatus::Completed
            && after.effective_status == JobStatus::Completed
        {
            self.announce_completed(current, &after);
        }

        if before.effective_status.is_active() {
            self.announce_partial(current, &after);
        }
    }
}

impl StoreObserver for NotificationAggregator {
    fn on_change(&self, previous: Option<&Job>, current: Option<&Job>) {
        match (previous, current) {
            (Some(previous), Some(current)) => self.observe_transition(previous, current),
            (Some(previous), None) => {
                if let Err(e) = self.markers.forget(previous.id) {
                    warn!("Failed to drop markers of job {}: {}", previous.id, e);
                }
            }
            (None, Some(current)) => self.observe_first_sighting(current),
            (None, None) => {}
        }
    }
}
