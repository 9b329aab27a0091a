//! Compiled graph
//!
//! The artifact handed to the orchestrator: named units, the edges between
//! them and their invocation and resource metadata.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::grouping::{GroupDependencies, topological_levels};
use crate::resources::ResourceSpec;

/// Version of the compiled graph layout
pub const SCHEMA_VERSION: &str = "2.1.0";

/// Node selector naming the accelerator type
pub const ACCELERATOR_SELECTOR: &str = "cloud.google.com/gke-accelerator";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGraph {
    pub schema_version: String,
    pub pipeline_info: PipelineInfo,
    pub run_name: String,
    pub units: BTreeMap<String, GeneratedUnit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One remotely executed unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedUnit {
    pub name: String,
    /// Group this unit runs; `None` for auxiliary units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub nodes: Vec<String>,
    pub image: String,
    pub image_pull_policy: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    /// Input name → value or placeholder
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
    /// Units that must finish before this one starts
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

/// Container resources; limits always equal requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator: Option<Accelerator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accelerator {
    pub count: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub accelerator_type: Option<String>,
}

impl ResourceRequirements {
    /// Requirements for a resolved spec, `None` when nothing is requested
    ///
    /// The accelerator type is taken from the [`ACCELERATOR_SELECTOR`] node
    /// selector when present.
    pub fn from_spec(spec: &ResourceSpec, selectors: &BTreeMap<String, String>) -> Option<Self> {
        if spec.is_empty() {
            return None;
        }

        Some(Self {
            cpu_limit: spec.cpu.clone(),
            cpu_request: spec.cpu.clone(),
            memory_limit: spec.memory.clone(),
            memory_request: spec.memory.clone(),
            accelerator: spec.gpu.as_ref().map(|count| Accelerator {
                count: count.clone(),
                accelerator_type: selectors.get(ACCELERATOR_SELECTOR).cloned(),
            }),
        })
    }
}

impl CompiledGraph {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the graph as pretty JSON
    pub fn write_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        tracing::debug!(path = %path.as_ref().display(), units = self.units.len(), "Wrote compiled graph");
        Ok(())
    }

    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    /// Units grouped into levels that may run concurrently
    ///
    /// `None` if the graph, e.g. one read back from disk, is cyclic.
    pub fn execution_levels(&self) -> Option<Vec<Vec<String>>> {
        let dependencies: GroupDependencies = self
            .units
            .iter()
            .map(|(name, unit)| (name.clone(), unit.dependencies.clone()))
            .collect();
        topological_levels(&dependencies).ok()
    }

    /// Unit names in a valid execution order
    pub fn execution_order(&self) -> Option<Vec<String>> {
        self.execution_levels()
            .map(|levels| levels.into_iter().flatten().collect())
    }

    pub fn unit(&self, name: &str) -> Option<&GeneratedUnit> {
        self.units.get(name)
    }
}
