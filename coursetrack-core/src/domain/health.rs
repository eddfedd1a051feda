//! Health and recovery domain types

use serde::{Deserialize, Serialize};

/// Derived health of a job that needs watching
///
/// Only processing and failed jobs carry a health status; queued, completed
/// and cancelled jobs have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Updated within the stall threshold
    Healthy,
    /// No update for longer than the stall threshold
    Stalled,
    /// No update for longer than the stuck threshold
    Stuck,
    Failed,
}

impl HealthStatus {
    /// Stalled, stuck and failed jobs are eligible for resume/restart
    pub fn needs_attention(&self) -> bool {
        !matches!(self, HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Stalled => write!(f, "stalled"),
            HealthStatus::Stuck => write!(f, "stuck"),
            HealthStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Command sent to the pipeline's control API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryAction {
    Resume,
    Restart,
    Delete,
}

impl RecoveryAction {
    /// Resume and restart only make sense for jobs that need attention
    pub fn requires_attention(&self) -> bool {
        !matches!(self, RecoveryAction::Delete)
    }
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryAction::Resume => write!(f, "resume"),
            RecoveryAction::Restart => write!(f, "restart"),
            RecoveryAction::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for RecoveryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resume" => Ok(RecoveryAction::Resume),
            "restart" => Ok(RecoveryAction::Restart),
            "delete" => Ok(RecoveryAction::Delete),
            other => Err(format!(
                "unknown recovery action '{}' (expected resume, restart or delete)",
                other
            )),
        }
    }
}

/// Action the UI should offer for a job, derived from its health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Resume,
    Restart,
    /// Too little succeeded to be worth restarting in place
    DeleteAndRetry,
}

impl RecommendedAction {
    /// The control command that starts this recommendation
    pub fn dispatch_action(&self) -> RecoveryAction {
        match self {
            RecommendedAction::Resume => RecoveryAction::Resume,
            RecommendedAction::Restart => RecoveryAction::Restart,
            RecommendedAction::DeleteAndRetry => RecoveryAction::Delete,
        }
    }
}
