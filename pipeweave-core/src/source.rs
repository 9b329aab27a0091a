//! Pipeline sources
//!
//! A [`PipelineSource`] supplies the dependency graph of a named pipeline and
//! the project parameters. [`ManifestSource`] reads both from a YAML or JSON
//! manifest exported by the pipeline framework:
//!
//! ```yaml
//! params:
//!   epochs: 3
//! pipelines:
//!   __default__:
//!     nodes:
//!       - name: prep
//!         inputs: [raw]
//!         outputs: [clean]
//!       - name: train
//!         tags: [group.training]
//!         inputs: [clean, params:epochs]
//!         outputs: [model]
//! ```
//!
//! A node depends on the node producing each of its inputs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

use crate::domain::{GraphError, Node, PipelineDependencyGraph};

/// Pipeline name used when none is given
pub const DEFAULT_PIPELINE: &str = "__default__";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read pipeline manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown pipeline '{name}' (available: {})", .known.join(", "))]
    UnknownPipeline { name: String, known: Vec<String> },

    #[error("Dataset '{dataset}' is produced by both '{first}' and '{second}'")]
    DuplicateProducer {
        dataset: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Provider of pipeline graphs and project parameters
pub trait PipelineSource: Send + Sync {
    /// Names of the pipelines this source knows
    fn pipeline_names(&self) -> Vec<String>;

    /// Dependency graph of one pipeline
    fn dependencies(&self, pipeline: &str) -> Result<PipelineDependencyGraph, SourceError>;

    /// Project parameters passed to every run
    fn params(&self) -> Map<String, Value>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineManifest {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// Manifest-backed pipeline source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestSource {
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    pipelines: BTreeMap<String, PipelineManifest>,
}

impl ManifestSource {
    /// Load a manifest, YAML or JSON by file extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let source = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };

        tracing::debug!(path = %path.display(), "Loaded pipeline manifest");
        Ok(source)
    }

    /// Parse a YAML manifest (JSON is valid YAML)
    pub fn from_yaml_str(content: &str) -> Result<Self, SourceError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn with_pipeline(mut self, name: impl Into<String>, nodes: Vec<Node>) -> Self {
        self.pipelines.insert(name.into(), PipelineManifest { nodes });
        self
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }
}

impl PipelineSource for ManifestSource {
    fn pipeline_names(&self) -> Vec<String> {
        self.pipelines.keys().cloned().collect()
    }

    fn dependencies(&self, pipeline: &str) -> Result<PipelineDependencyGraph, SourceError> {
        let manifest = self
            .pipelines
            .get(pipeline)
            .ok_or_else(|| SourceError::UnknownPipeline {
                name: pipeline.to_string(),
                known: self.pipeline_names(),
            })?;

        let mut producers: BTreeMap<&str, &str> = BTreeMap::new();
        for node in &manifest.nodes {
            for output in &node.outputs {
                if let Some(first) = producers.insert(output, &node.name) {
                    return Err(SourceError::DuplicateProducer {
                        dataset: output.clone(),
                        first: first.to_string(),
                        second: node.name.clone(),
                    });
                }
            }
        }

        let parts = manifest.nodes.iter().map(|node| {
            let parents: BTreeSet<String> = node
                .inputs
                .iter()
                .filter_map(|input| producers.get(input.as_str()))
                .filter(|producer| **producer != node.name)
                .map(|producer| producer.to_string())
                .collect();
            (node.clone(), parents)
        });

        Ok(PipelineDependencyGraph::try_from_parts(parts)?)
    }

    fn params(&self) -> Map<String, Value> {
        self.params.clone()
    }
}
