//! Jobs repository
//!
//! Pull and control operations against the generation pipeline:
//! - Fetching every non-cleared job of an owner
//! - Resuming, restarting and deleting a job
//! - Clearing a job from the active view

use async_trait::async_trait;
use coursetrack_client::{ClientError, PipelineClient};
use coursetrack_core::domain::health::RecoveryAction;
use coursetrack_core::domain::job::Job;
use coursetrack_core::dto::job::ControlOutcome;
use uuid::Uuid;

/// Repository trait for job operations against the pipeline's API
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Fetches every non-cleared job of an owner, newest first
    ///
    /// # Arguments
    /// * `owner_id` - The user the jobs belong to
    async fn fetch_jobs(&self, owner_id: Uuid) -> Result<Vec<Job>, ClientError>;

    /// Sends one recovery command for a job
    ///
    /// # Arguments
    /// * `job_id` - The job to act on
    /// * `action` - Resume, restart or delete
    async fn control(
        &self,
        job_id: Uuid,
        action: RecoveryAction,
    ) -> Result<ControlOutcome, ClientError>;

    /// Sets `is_cleared` on a job
    async fn clear(&self, job_id: Uuid) -> Result<ControlOutcome, ClientError>;
}

/// HTTP implementation of JobRepository
pub struct HttpJobRepository {
    client: PipelineClient,
}

impl HttpJobRepository {
    /// Creates a new HTTP job repository
    ///
    /// # Arguments
    /// * `api_url` - Base URL of the job API (e.g., "http://localhost:8080")
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(PipelineClient::new(api_url))
    }

    pub fn with_client(client: PipelineClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn fetch_jobs(&self, owner_id: Uuid) -> Result<Vec<Job>, ClientError> {
        self.client.list_jobs(owner_id).await
    }

    async fn control(
        &self,
        job_id: Uuid,
        action: RecoveryAction,
    ) -> Result<ControlOutcome, ClientError> {
        match action {
            RecoveryAction::Resume => self.client.resume_job(job_id).await,
            RecoveryAction::Restart => self.client.restart_job(job_id).await,
            RecoveryAction::Delete => self.client.delete_job(job_id).await,
        }
    }

    async fn clear(&self, job_id: Uuid) -> Result<ControlOutcome, ClientError> {
        self.client.clear_job(job_id).await
    }
}
