//! Schedule-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use pipeweave_core::domain::job::Schedule;
use pipeweave_core::dto::schedule::CreateSchedule;
use reqwest::Method;

impl OrchestratorClient {
    // =============================================================================
    // Schedules
    // =============================================================================

    /// List all registered schedules
    pub async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let response = self.request(Method::GET, "/api/schedules").send().await?;

        self.handle_response(response).await
    }

    /// Register a recurring run of a compiled pipeline
    pub async fn create_schedule(&self, req: &CreateSchedule) -> Result<Schedule> {
        let response = self
            .request(Method::POST, "/api/schedules")
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete a schedule by ID
    pub async fn delete_schedule(&self, schedule_id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/api/schedules/{}", schedule_id))
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
