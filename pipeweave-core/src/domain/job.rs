//! Job domain types
//!
//! Records returned by the orchestration service for submitted pipeline runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pipeline job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub display_name: String,
    pub state: PipelineState,
    pub pipeline_name: Option<String>,
    pub create_time: chrono::DateTime<chrono::Utc>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub parameter_values: HashMap<String, serde_json::Value>,
    pub error_message: Option<String>,
}

/// Pipeline job state as reported by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    #[serde(rename = "PIPELINE_STATE_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "PIPELINE_STATE_QUEUED")]
    Queued,
    #[serde(rename = "PIPELINE_STATE_PENDING")]
    Pending,
    #[serde(rename = "PIPELINE_STATE_RUNNING")]
    Running,
    #[serde(rename = "PIPELINE_STATE_SUCCEEDED")]
    Succeeded,
    #[serde(rename = "PIPELINE_STATE_FAILED")]
    Failed,
    #[serde(rename = "PIPELINE_STATE_CANCELLING")]
    Cancelling,
    #[serde(rename = "PIPELINE_STATE_CANCELLED")]
    Cancelled,
    #[serde(rename = "PIPELINE_STATE_PAUSED")]
    Paused,
}

impl PipelineState {
    /// Whether the job will not change state any more
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Final outcome of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub is_success: bool,
    pub state: PipelineState,
    pub job: Option<Job>,
}

impl From<Job> for PipelineResult {
    fn from(job: Job) -> Self {
        Self {
            is_success: job.state == PipelineState::Succeeded,
            state: job.state,
            job: Some(job),
        }
    }
}

/// Recurring run registered with the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub pipeline_name: String,
    pub cron: String,
    pub time_zone: String,
    pub create_time: Option<chrono::DateTime<chrono::Utc>>,
}
