//! Health classification
//!
//! Pure functions over a job and the current time. Nothing here is cached
//! or stored: callers recompute the projection on every read, so it always
//! reflects the clock and the latest row.
//!
//! The projection resolves status drift. A pipeline can finish every task
//! and still leave the row in `processing`; when the counters show nothing
//! outstanding the projection promotes the job to a terminal status without
//! touching the raw field. Everything that decides what to display or which
//! recovery to offer must read the projection, never `job.status`.

use chrono::{DateTime, Duration, Utc};
use coursetrack_core::domain::health::{HealthStatus, RecommendedAction};
use coursetrack_core::domain::job::{Job, JobStatus};
use coursetrack_core::dto::job::TrackedJob;
use tracing::debug;

use crate::error::ConfigError;

/// Thresholds used by the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthPolicy {
    /// Silence after which a processing job is stalled (healthy up to and including it)
    pub stall_after: Duration,
    /// Silence after which a processing job is stuck
    pub stuck_after: Duration,
    /// Minimum success rate for an effectively complete job to count as completed
    pub completion_cutoff: f64,
    /// Below this success rate a failed job is better deleted and retried
    pub retry_from_scratch_below: f64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            stall_after: Duration::minutes(5),
            stuck_after: Duration::minutes(10),
            completion_cutoff: 0.7,
            retry_from_scratch_below: 0.2,
        }
    }
}

impl HealthPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stall_after <= Duration::zero() {
            return Err(ConfigError::invalid("stall_after", "must be positive"));
        }
        if self.stuck_after <= self.stall_after {
            return Err(ConfigError::invalid(
                "stuck_after",
                "must be longer than stall_after",
            ));
        }
        if !(0.0..=1.0).contains(&self.completion_cutoff) {
            return Err(ConfigError::invalid(
                "completion_cutoff",
                "must be between 0 and 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.retry_from_scratch_below) {
            return Err(ConfigError::invalid(
                "retry_from_scratch_below",
                "must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Everything derived from a job at a given instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobProjection {
    pub effective_status: JobStatus,
    pub effectively_complete: bool,
    pub success_rate: Option<f64>,
    pub health: Option<HealthStatus>,
    pub recommended_action: Option<RecommendedAction>,
    pub display_progress: u8,
}

/// Classify a job with the default policy
pub fn classify(job: &Job, now: DateTime<Utc>) -> Option<HealthStatus> {
    project(job, now, &HealthPolicy::default()).health
}

/// Derive the full projection of a job
pub fn project(job: &Job, now: DateTime<Utc>, policy: &HealthPolicy) -> JobProjection {
    let counters = CounterView::of(job);
    let success_rate = counters.success_rate();

    let effectively_complete = job.status == JobStatus::Processing && counters.all_settled();
    let effective_status = if effectively_complete {
        match success_rate {
            Some(rate) if rate >= policy.completion_cutoff => JobStatus::Completed,
            _ => JobStatus::Failed,
        }
    } else {
        job.status
    };

    let health = health_of(effective_status, job.updated_at, now, policy);
    let recommended_action = health.and_then(|h| recommend(h, success_rate, policy));

    let display_progress = if effectively_complete {
        100
    } else {
        counters
            .progress()
            .unwrap_or_else(|| job.progress_percentage.min(100))
    };

    JobProjection {
        effective_status,
        effectively_complete,
        success_rate,
        health,
        recommended_action,
        display_progress,
    }
}

/// Build the UI view of a job
pub fn track(job: Job, now: DateTime<Utc>, policy: &HealthPolicy) -> TrackedJob {
    let projection = project(&job, now, policy);
    TrackedJob {
        job,
        health_status: projection.health,
        effective_status: projection.effective_status,
        effectively_complete: projection.effectively_complete,
        success_rate: projection.success_rate,
        recommended_action: projection.recommended_action,
        display_progress: projection.display_progress,
    }
}

/// Recovery to offer for a health status
pub fn recommend(
    health: HealthStatus,
    success_rate: Option<f64>,
    policy: &HealthPolicy,
) -> Option<RecommendedAction> {
    match health {
        HealthStatus::Healthy => None,
        HealthStatus::Stalled => Some(RecommendedAction::Resume),
        HealthStatus::Stuck => Some(RecommendedAction::Restart),
        HealthStatus::Failed => match success_rate {
            Some(rate) if rate < policy.retry_from_scratch_below => {
                Some(RecommendedAction::DeleteAndRetry)
            }
            _ => Some(RecommendedAction::Restart),
        },
    }
}

/// Whether the counters of a job contradict each other
///
/// Only meaningful when every counter is present.
pub fn has_inconsistent_counters(job: &Job) -> bool {
    job.counters().is_some_and(|c| !c.is_consistent())
}

fn health_of(
    status: JobStatus,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
    policy: &HealthPolicy,
) -> Option<HealthStatus> {
    match status {
        JobStatus::Processing => {
            let silence = now.signed_duration_since(updated_at);
            if silence <= policy.stall_after {
                Some(HealthStatus::Healthy)
            } else if silence < policy.stuck_after {
                Some(HealthStatus::Stalled)
            } else {
                Some(HealthStatus::Stuck)
            }
        }
        JobStatus::Failed => Some(HealthStatus::Failed),
        JobStatus::Queued | JobStatus::Completed | JobStatus::Cancelled => None,
    }
}

/// Task counters as far as they can be trusted
enum CounterView {
    /// No usable total: absent, zero, or contradicted by the other counters
    Unknown,
    Known {
        total: u32,
        completed: Option<u32>,
        failed: u32,
        outstanding: u32,
        /// Every counter was present
        complete_set: bool,
    },
}

impl CounterView {
    fn of(job: &Job) -> Self {
        let total = match job.total_tasks {
            Some(total) if total > 0 => total,
            _ => return CounterView::Unknown,
        };

        if has_inconsistent_counters(job) {
            debug!(
                "Job {} counters do not add up to total_tasks={}, treating total as unknown",
                job.id, total
            );
            return CounterView::Unknown;
        }

        let pending = job.pending_tasks.unwrap_or(0);
        let running = job.running_tasks.unwrap_or(0);

        CounterView::Known {
            total,
            completed: job.completed_tasks,
            failed: job.failed_tasks.unwrap_or(0),
            outstanding: pending.saturating_add(running),
            complete_set: job.counters().is_some(),
        }
    }

    fn success_rate(&self) -> Option<f64> {
        match self {
            CounterView::Known {
                total,
                completed: Some(completed),
                ..
            } => Some((f64::from(*completed) / f64::from(*total)).min(1.0)),
            _ => None,
        }
    }

    /// Every task has either completed or failed and nothing is outstanding
    fn all_settled(&self) -> bool {
        match self {
            CounterView::Known {
                total,
                completed: Some(completed),
                failed,
                outstanding,
                ..
            } => {
                u64::from(*completed) + u64::from(*failed) >= u64::from(*total)
                    && *outstanding == 0
            }
            _ => false,
        }
    }

    fn progress(&self) -> Option<u8> {
        match self {
            CounterView::Known {
                total,
                completed: Some(completed),
                failed,
                complete_set: true,
                ..
            } => {
                let settled = u64::from(*completed) + u64::from(*failed);
                Some((settled * 100 / u64::from(*total)).min(100) as u8)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn processing_job(updated_at: DateTime<Utc>) -> Job {
        let mut job = Job::new(Uuid::new_v4(), Uuid::new_v4(), updated_at - Duration::hours(1));
        job.status = JobStatus::Processing;
        job.updated_at = updated_at;
        job
    }

    fn with_counters(mut job: Job, counters: [u32; 5]) -> Job {
        let [total, completed, failed, pending, running] = counters;
        job.total_tasks = Some(total);
        job.completed_tasks = Some(completed);
        job.failed_tasks = Some(failed);
        job.pending_tasks = Some(pending);
        job.running_tasks = Some(running);
        job
    }

    #[test]
    fn test_health_boundaries() {
        let now = Utc::now();

        let at_five = processing_job(now - Duration::minutes(5));
        assert_eq!(classify(&at_five, now), Some(HealthStatus::Healthy));

        let past_five = processing_job(now - Duration::minutes(5) - Duration::seconds(1));
        assert_eq!(classify(&past_five, now), Some(HealthStatus::Stalled));

        let just_under_ten = processing_job(now - Duration::minutes(10) + Duration::seconds(1));
        assert_eq!(classify(&just_under_ten, now), Some(HealthStatus::Stalled));

        let at_ten = processing_job(now - Duration::minutes(10));
        assert_eq!(classify(&at_ten, now), Some(HealthStatus::Stuck));

        let fresh = processing_job(now);
        assert_eq!(classify(&fresh, now), Some(HealthStatus::Healthy));
    }

    #[test]
    fn test_future_timestamp_is_healthy() {
        let now = Utc::now();
        let skewed = processing_job(now + Duration::seconds(30));
        assert_eq!(classify(&skewed, now), Some(HealthStatus::Healthy));
    }

    #[test]
    fn test_non_processing_statuses() {
        let now = Utc::now();
        let mut job = processing_job(now - Duration::hours(2));

        job.status = JobStatus::Failed;
        assert_eq!(classify(&job, now), Some(HealthStatus::Failed));

        for status in [JobStatus::Queued, JobStatus::Completed, JobStatus::Cancelled] {
            job.status = status;
            assert_eq!(classify(&job, now), None);
        }
    }

    #[test]
    fn test_effective_completion_promotion() {
        let now = Utc::now();
        let job = with_counters(processing_job(now), [10, 8, 2, 0, 0]);

        let projection = project(&job, now, &HealthPolicy::default());
        assert!(projection.effectively_complete);
        assert_eq!(projection.success_rate, Some(0.8));
        assert_eq!(projection.effective_status, JobStatus::Completed);
        assert_eq!(projection.health, None);
        assert_eq!(projection.recommended_action, None);
        assert_eq!(projection.display_progress, 100);
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[test]
    fn test_promotion_below_cutoff_is_failed() {
        let now = Utc::now();
        let job = with_counters(processing_job(now), [10, 6, 4, 0, 0]);

        let projection = project(&job, now, &HealthPolicy::default());
        assert!(projection.effectively_complete);
        assert_eq!(projection.effective_status, JobStatus::Failed);
        assert_eq!(projection.health, Some(HealthStatus::Failed));
        assert_eq!(
            projection.recommended_action,
            Some(RecommendedAction::Restart)
        );
    }

    #[test]
    fn test_exact_cutoff_counts_as_completed() {
        let now = Utc::now();
        let job = with_counters(processing_job(now), [10, 7, 3, 0, 0]);
        let projection = project(&job, now, &HealthPolicy::default());
        assert_eq!(projection.effective_status, JobStatus::Completed);
    }

    #[test]
    fn test_no_promotion_with_outstanding_tasks() {
        let now = Utc::now();
        let job = with_counters(processing_job(now), [10, 7, 0, 2, 1]);

        let projection = project(&job, now, &HealthPolicy::default());
        assert!(!projection.effectively_complete);
        assert_eq!(projection.effective_status, JobStatus::Processing);
        assert_eq!(projection.display_progress, 70);
        assert_eq!(projection.success_rate, Some(0.7));
    }

    #[test]
    fn test_no_promotion_without_total() {
        let now = Utc::now();
        let mut job = processing_job(now);
        job.completed_tasks = Some(5);
        job.progress_percentage = 42;

        let projection = project(&job, now, &HealthPolicy::default());
        assert!(!projection.effectively_complete);
        assert_eq!(projection.success_rate, None);
        assert_eq!(projection.display_progress, 42);
    }

    #[test]
    fn test_inconsistent_counters_fall_back_to_percentage() {
        let now = Utc::now();
        let mut job = with_counters(processing_job(now), [10, 9, 2, 0, 0]);
        job.progress_percentage = 55;

        assert!(has_inconsistent_counters(&job));
        let projection = project(&job, now, &HealthPolicy::default());
        assert!(!projection.effectively_complete);
        assert_eq!(projection.success_rate, None);
        assert_eq!(projection.display_progress, 55);
        assert_eq!(projection.effective_status, JobStatus::Processing);
    }

    #[test]
    fn test_partial_counters_still_promote() {
        let now = Utc::now();
        let mut job = processing_job(now);
        job.total_tasks = Some(4);
        job.completed_tasks = Some(4);

        let projection = project(&job, now, &HealthPolicy::default());
        assert!(projection.effectively_complete);
        assert_eq!(projection.success_rate, Some(1.0));
        assert_eq!(projection.effective_status, JobStatus::Completed);
    }

    #[test]
    fn test_zero_total_is_unknown() {
        let now = Utc::now();
        let job = with_counters(processing_job(now), [0, 0, 0, 0, 0]);
        let projection = project(&job, now, &HealthPolicy::default());
        assert!(!projection.effectively_complete);
        assert_eq!(projection.success_rate, None);
    }

    #[test]
    fn test_recommendations() {
        let policy = HealthPolicy::default();
        assert_eq!(recommend(HealthStatus::Healthy, None, &policy), None);
        assert_eq!(
            recommend(HealthStatus::Stalled, None, &policy),
            Some(RecommendedAction::Resume)
        );
        assert_eq!(
            recommend(HealthStatus::Stuck, Some(0.9), &policy),
            Some(RecommendedAction::Restart)
        );
        assert_eq!(
            recommend(HealthStatus::Failed, None, &policy),
            Some(RecommendedAction::Restart)
        );
        assert_eq!(
            recommend(HealthStatus::Failed, Some(0.5), &policy),
            Some(RecommendedAction::Restart)
        );
        assert_eq!(
            recommend(HealthStatus::Failed, Some(0.1), &policy),
            Some(RecommendedAction::DeleteAndRetry)
        );
    }

    #[test]
    fn test_stalled_job_recommends_resume() {
        let now = Utc::now();
        let job = processing_job(now - Duration::minutes(7));
        let tracked = track(job, now, &HealthPolicy::default());
        assert_eq!(tracked.health_status, Some(HealthStatus::Stalled));
        assert_eq!(tracked.recommended_action, Some(RecommendedAction::Resume));
    }

    #[test]
    fn test_policy_validation() {
        assert!(HealthPolicy::default().validate().is_ok());

        let inverted = HealthPolicy {
            stuck_after: Duration::minutes(4),
            ..HealthPolicy::default()
        };
        assert!(inverted.validate().is_err());

        let bad_cutoff = HealthPolicy {
            completion_cutoff: 1.5,
            ..HealthPolicy::default()
        };
        assert!(bad_cutoff.validate().is_err());
    }
}
