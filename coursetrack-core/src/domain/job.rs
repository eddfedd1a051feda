//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Course-generation job record
///
/// Written exclusively by the generation pipeline. The tracker only reads
/// it, apart from the `is_cleared` flag set through the dismiss operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub status: JobStatus,
    #[serde(default)]
    pub progress_percentage: u8,
    #[serde(default)]
    pub total_tasks: Option<u32>,
    #[serde(default)]
    pub completed_tasks: Option<u32>,
    #[serde(default)]
    pub failed_tasks: Option<u32>,
    #[serde(default)]
    pub pending_tasks: Option<u32>,
    #[serde(default)]
    pub running_tasks: Option<u32>,
    /// Display-only label such as "outline", "lessons" or "assessments"
    #[serde(default)]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_cleared: bool,
}

impl Job {
    /// Creates a queued job with no task counters
    pub fn new(id: Uuid, owner_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            status: JobStatus::Queued,
            progress_percentage: 0,
            total_tasks: None,
            completed_tasks: None,
            failed_tasks: None,
            pending_tasks: None,
            running_tasks: None,
            current_phase: None,
            error_message: None,
            created_at,
            updated_at: created_at,
            is_cleared: false,
        }
    }

    /// Whether the pipeline is still expected to make progress on this job
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Task counters, if every one of them is known
    pub fn counters(&self) -> Option<TaskCounters> {
        Some(TaskCounters {
            total: self.total_tasks?,
            completed: self.completed_tasks?,
            failed: self.failed_tasks?,
            pending: self.pending_tasks?,
            running: self.running_tasks?,
        })
    }
}

/// Fully-known task counters of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCounters {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub pending: u32,
    pub running: u32,
}

impl TaskCounters {
    /// `completed + failed + pending + running == total`
    pub fn is_consistent(&self) -> bool {
        let sum = u64::from(self.completed)
            + u64::from(self.failed)
            + u64::from(self.pending)
            + u64::from(self.running);
        sum == u64::from(self.total)
    }
}

/// Job lifecycle status as stored by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Queued and processing jobs still need watching
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_row_with_missing_counters() {
        let row = serde_json::json!({
            "id": "6f1c2f4e-8f0a-4a7e-9a51-0c1d3f1b8a10",
            "owner_id": "0b5a3c3e-2f44-4f55-8e6f-2e1f6a9c1d20",
            "status": "processing",
            "progress_percentage": 40,
            "total_tasks": 10,
            "created_at": "2026-01-01T10:00:00Z",
            "updated_at": "2026-01-01T10:05:00Z",
            "some_other_column": "ignored"
        });

        let job: Job = serde_json::from_value(row).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.total_tasks, Some(10));
        assert_eq!(job.completed_tasks, None);
        assert!(!job.is_cleared);
        assert!(job.counters().is_none());
    }

    #[test]
    fn test_counter_consistency() {
        let consistent = TaskCounters {
            total: 10,
            completed: 6,
            failed: 1,
            pending: 2,
            running: 1,
        };
        assert!(consistent.is_consistent());

        let inconsistent = TaskCounters {
            pending: 5,
            ..consistent
        };
        assert!(!inconsistent.is_consistent());
    }

    #[test]
    fn test_active_statuses() {
        assert!(JobStatus::Queued.is_active());
        assert!(JobStatus::Processing.is_active());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }
}
