//! Job DTOs for orchestrator communication

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::generator::CompiledGraph;

/// Request to submit a single pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJob {
    pub job_id: String,
    pub display_name: String,
    pub pipeline_root: String,
    pub spec: CompiledGraph,
    pub parameter_values: HashMap<String, serde_json::Value>,
    pub enable_caching: bool,
    pub service_account: Option<String>,
    pub network: Option<String>,
}
