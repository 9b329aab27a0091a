//! Schedule DTOs for orchestrator communication

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::generator::CompiledGraph;

/// Request to register a recurring pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSchedule {
    pub display_name: String,
    pub cron: String,
    pub time_zone: String,
    pub pipeline_root: String,
    pub spec: CompiledGraph,
    pub parameter_values: HashMap<String, serde_json::Value>,
    pub enable_caching: bool,
    pub service_account: Option<String>,
}
