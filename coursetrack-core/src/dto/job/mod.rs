//! Job DTOs exchanged with the control API and handed to UI consumers

use serde::{Deserialize, Serialize};

use crate::domain::health::{HealthStatus, RecommendedAction};
use crate::domain::job::{Job, JobStatus};

/// Outcome returned by every control endpoint (resume, restart, delete, clear)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ControlOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// A job together with everything derived from it at read time
///
/// Nothing here besides `job` is persisted; the rest is recomputed on every
/// read so it always reflects the current clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedJob {
    pub job: Job,
    pub health_status: Option<HealthStatus>,
    /// Status to display and act upon; may run ahead of `job.status`
    pub effective_status: JobStatus,
    pub effectively_complete: bool,
    pub success_rate: Option<f64>,
    pub recommended_action: Option<RecommendedAction>,
    pub display_progress: u8,
}
