//! Job-related API endpoints

use std::time::Duration;

use crate::OrchestratorClient;
use crate::error::{ClientError, Result};
use pipeweave_core::domain::job::{Job, PipelineResult};
use pipeweave_core::dto::job::SubmitJob;
use reqwest::Method;

impl OrchestratorClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit a compiled pipeline for a single run
    ///
    /// # Returns
    /// The created job
    pub async fn submit_job(&self, req: &SubmitJob) -> Result<Job> {
        let response = self.request(Method::POST, "/api/jobs").json(req).send().await?;

        let job: Job = self.handle_response(response).await?;
        tracing::info!(job_id = %job.id, units = req.spec.units.len(), "Submitted pipeline job");
        Ok(job)
    }

    /// Get a job by ID
    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        let response = self
            .request(Method::GET, &format!("/api/jobs/{}", job_id))
            .send()
            .await?;

        match self.handle_response(response).await {
            Err(e) if e.is_not_found() => Err(ClientError::NotFound(format!("job {}", job_id))),
            other => other,
        }
    }

    /// List all jobs (current and historical)
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let response = self.request(Method::GET, "/api/jobs").send().await?;

        self.handle_response(response).await
    }

    /// Poll a job until it reaches a terminal state
    ///
    /// # Arguments
    /// * `job_id` - The job to watch
    /// * `poll_interval` - Delay between status checks
    /// * `timeout` - Give up after this long
    pub async fn wait_for_completion(
        &self,
        job_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<PipelineResult> {
        let started = tokio::time::Instant::now();

        loop {
            let job = self.get_job(job_id).await?;
            tracing::debug!(job_id, state = ?job.state, "Polled job state");

            if job.state.is_terminal() {
                return Ok(job.into());
            }

            if started.elapsed() + poll_interval > timeout {
                return Err(ClientError::Timeout {
                    job_id: job_id.to_string(),
                    waited: started.elapsed(),
                });
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}
