//! Error types for the tracker
//!
//! Every error is caught at the component that produced it and turned into
//! a connection status or a notification. Only recovery, configuration and
//! session start-up errors are ever returned to a caller.

use coursetrack_client::ClientError;
use coursetrack_core::domain::health::{HealthStatus, RecoveryAction};
use thiserror::Error;
use uuid::Uuid;

/// Push channel failed to open, errored, or timed out
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to open channel: {0}")]
    Connect(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("subscription not confirmed within {0:?}")]
    Timeout(std::time::Duration),

    #[error("channel closed by server")]
    Closed,
}

/// Pull fetch failed; retried on the next poll
#[derive(Debug, Error)]
#[error("failed to fetch jobs: {0}")]
pub struct FetchError(#[from] pub ClientError);

/// Recovery request was refused locally or by the control API
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("{action} already in progress for job {job_id}")]
    AlreadyInProgress { job_id: Uuid, action: RecoveryAction },

    #[error("job {0} is not tracked")]
    UnknownJob(Uuid),

    #[error("job {job_id} does not need recovery (health: {health})")]
    NotEligible { job_id: Uuid, health: Eligibility },

    #[error("{action} rejected for job {job_id}: {message}")]
    Rejected {
        job_id: Uuid,
        action: RecoveryAction,
        message: String,
    },

    #[error("{action} request for job {job_id} failed: {source}")]
    Client {
        job_id: Uuid,
        action: RecoveryAction,
        #[source]
        source: ClientError,
    },

    #[error("dismiss already in progress for job {0}")]
    DismissInProgress(Uuid),

    #[error("failed to dismiss job {job_id}: {message}")]
    DismissFailed { job_id: Uuid, message: String },
}

/// Health of a job refused by the eligibility check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Unclassified,
    Classified(HealthStatus),
}

impl std::fmt::Display for Eligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Eligibility::Unclassified => write!(f, "none"),
            Eligibility::Classified(health) => write!(f, "{}", health),
        }
    }
}

/// Notification markers could not be read or persisted
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("marker file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("marker file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Configuration holds an invalid value
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Session could not be started
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Markers(#[from] MarkerError),

    #[error("initial load failed: {0}")]
    InitialLoad(#[from] FetchError),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
