//! Job-related API endpoints

use crate::PipelineClient;
use crate::error::Result;
use coursetrack_core::domain::job::Job;
use coursetrack_core::dto::job::ControlOutcome;
use uuid::Uuid;

impl PipelineClient {
    // =============================================================================
    // Pull
    // =============================================================================

    /// List every non-cleared job of an owner, newest first
    ///
    /// # Arguments
    /// * `owner_id` - The user the jobs belong to
    ///
    /// # Example
    /// ```no_run
    /// # use coursetrack_client::PipelineClient;
    /// # use uuid::Uuid;
    /// # async fn example() -> coursetrack_client::Result<()> {
    /// let client = PipelineClient::new("http://localhost:8080");
    /// let jobs = client.list_jobs(Uuid::new_v4()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_jobs(&self, owner_id: Uuid) -> Result<Vec<Job>> {
        let url = format!("{}/api/jobs", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("owner_id", owner_id.to_string())])
            .send()
            .await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Control
    // =============================================================================

    /// Ask the pipeline to continue a stalled job from where it stopped
    pub async fn resume_job(&self, job_id: Uuid) -> Result<ControlOutcome> {
        let url = format!("{}/api/jobs/{}/resume", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Ask the pipeline to start a job over
    pub async fn restart_job(&self, job_id: Uuid) -> Result<ControlOutcome> {
        let url = format!("{}/api/jobs/{}/restart", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Permanently delete a job
    pub async fn delete_job(&self, job_id: Uuid) -> Result<ControlOutcome> {
        let url = format!("{}/api/jobs/{}", self.base_url, job_id);
        let response = self.client.delete(&url).send().await?;

        self.handle_response(response).await
    }

    /// Set `is_cleared` on a job, hiding it from the active view
    pub async fn clear_job(&self, job_id: Uuid) -> Result<ControlOutcome> {
        let url = format!("{}/api/jobs/{}/clear", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }
}
