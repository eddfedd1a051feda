//! One-shot user-facing notifications

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::health::RecoveryAction;

/// Event emitted at most once per job per transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A job's effective status became completed
    Completed { job_id: Uuid, success_rate: Option<f64> },
    /// A job finished all tasks, but not all of them succeeded
    PartialCompletion { job_id: Uuid, success_rate: f64 },
    /// A job was dismissed from the active view
    Dismissed { job_id: Uuid },
    /// A recovery request was rejected or could not be delivered
    RecoveryFailed {
        job_id: Uuid,
        action: RecoveryAction,
        message: String,
    },
    /// Push retries exhausted, updates now come from polling
    ConnectionDegraded,
    /// Push channel is subscribed again after being degraded
    ConnectionRestored,
    /// Consecutive fetches failed; dismissible
    FetchFailed {
        consecutive_failures: u32,
        message: String,
    },
}

/// Per-job transitions that are remembered across reloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Job was seen queued or processing at least once
    ObservedActive,
    Completed,
    PartialCompletion,
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionKind::ObservedActive => write!(f, "observed_active"),
            TransitionKind::Completed => write!(f, "completed"),
            TransitionKind::PartialCompletion => write!(f, "partial_completion"),
        }
    }
}
