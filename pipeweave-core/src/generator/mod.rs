//! Pipeline generation
//!
//! Turns a [`Grouping`] into a [`CompiledGraph`]: one unit per group, edges
//! copied from the group dependencies, and resources and selectors resolved
//! from the run configuration.

mod command;
pub mod compiled;
pub mod naming;

pub use command::{
    CLI_COMMAND, CONFIG_HOOK_ENV, GLOBALS_PATTERN_ENV, MLFLOW_RUN_ID_PLACEHOLDER,
    PIPELINE_JOB_ID_PLACEHOLDER, RUN_ID_ENV, RUNTIME_CONFIG_FILE, UnitEnvironment, shell_quote,
};
pub use compiled::{
    ACCELERATOR_SELECTOR, Accelerator, CompiledGraph, GeneratedUnit, PipelineInfo,
    ResourceRequirements, SCHEMA_VERSION,
};

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::config::{PluginConfig, RunConfig};
use crate::grouping::{Grouping, GroupingError, NodeGrouper};
use crate::source::{PipelineSource, SourceError};
use command::CommandBuilder;

/// Name of the unit that allocates the tracking run id
pub const MLFLOW_UNIT: &str = "mlflow-start-run";

/// Reference to the run id produced by [`MLFLOW_UNIT`]
pub const MLFLOW_RUN_OUTPUT: &str = "{{$.tasks['mlflow-start-run'].outputs['output']}}";

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Group '{group}' does not produce a valid unit name")]
    EmptyName { group: String },

    #[error("Groups '{first}' and '{second}' both compile to unit '{unit}'")]
    NameCollision {
        unit: String,
        first: String,
        second: String,
    },

    #[error("Group '{group}' depends on '{dependency}', which is not part of the grouping")]
    UnknownDependency { group: String, dependency: String },

    #[error("Run name cannot be empty")]
    EmptyRunName,

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Compiles groupings of one project into orchestrator graphs
pub struct PipelineGenerator {
    project_name: String,
    env: String,
    run_name: String,
    run_config: RunConfig,
    grouper: Box<dyn NodeGrouper>,
    params: Map<String, Value>,
    environment: UnitEnvironment,
}

impl PipelineGenerator {
    /// Create a generator using `grouper` for every pipeline it compiles
    pub fn new(
        config: &PluginConfig,
        project_name: impl Into<String>,
        env: impl Into<String>,
        run_name: impl Into<String>,
        grouper: Box<dyn NodeGrouper>,
    ) -> Result<Self, GeneratorError> {
        let run_name = run_name.into();
        if run_name.trim().is_empty() {
            return Err(GeneratorError::EmptyRunName);
        }

        Ok(Self {
            project_name: project_name.into(),
            env: env.into(),
            run_name,
            run_config: config.run_config.clone(),
            grouper,
            params: Map::new(),
            environment: UnitEnvironment::default(),
        })
    }

    /// Run parameters materialized into each unit's runtime config
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Process environment forwarded into every unit command
    pub fn with_environment(mut self, environment: UnitEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn pipeline_name(&self) -> String {
        naming::pipeline_name(&self.project_name)
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn grouper(&self) -> &dyn NodeGrouper {
        self.grouper.as_ref()
    }

    /// Group `pipeline` from `source` and compile it
    pub fn generate_pipeline(
        &self,
        source: &dyn PipelineSource,
        pipeline: &str,
        image: &str,
        token: &str,
    ) -> Result<CompiledGraph, GeneratorError> {
        let graph = source.dependencies(pipeline)?;
        let grouping = self.grouper.group(&graph)?;
        self.generate(pipeline, image, token, &grouping)
    }

    /// Compile a grouping of `pipeline` into a graph of units
    ///
    /// # Errors
    /// Fails when a group name sanitizes to nothing, two groups share a unit
    /// name, or a dependency names a group outside the grouping.
    pub fn generate(
        &self,
        pipeline: &str,
        image: &str,
        token: &str,
        grouping: &Grouping,
    ) -> Result<CompiledGraph, GeneratorError> {
        let mlflow = self.run_config.mlflow.enabled;
        let unit_names = self.unit_names(grouping, mlflow)?;
        let commands = CommandBuilder::new(&self.run_config, &self.env, &self.params, &self.environment);

        let mut units = BTreeMap::new();

        if mlflow {
            units.insert(MLFLOW_UNIT.to_string(), self.mlflow_unit(&commands, image, token));
        }

        for (group, members) in grouping.nodes_mapping() {
            let name = unit_names[group.as_str()].clone();
            let tags = grouping.group_tags(group);
            let nodes: Vec<String> = members.iter().map(|node| node.name.clone()).collect();

            let resources = self.run_config.resources_for(group, &tags);
            let node_selector = self.run_config.node_selectors_for(group, &tags);

            let mut dependencies = BTreeSet::new();
            for dependency in &grouping.dependencies()[group] {
                let unit = unit_names.get(dependency.as_str()).ok_or_else(|| {
                    GeneratorError::UnknownDependency {
                        group: group.clone(),
                        dependency: dependency.clone(),
                    }
                })?;
                dependencies.insert(unit.clone());
            }

            let mut inputs = BTreeMap::new();
            if mlflow {
                dependencies.insert(MLFLOW_UNIT.to_string());
                inputs.insert("mlflow_run_id".to_string(), MLFLOW_RUN_OUTPUT.to_string());
            }

            let unit = GeneratedUnit {
                args: vec![commands.unit_command(pipeline, &nodes, mlflow)],
                name: name.clone(),
                group: Some(group.clone()),
                nodes,
                image: image.to_string(),
                image_pull_policy: self.run_config.image_pull_policy.clone(),
                command: shell(),
                inputs,
                outputs: Vec::new(),
                dependencies,
                resources: ResourceRequirements::from_spec(&resources, &node_selector),
                node_selector,
            };
            units.insert(name, unit);
        }

        tracing::info!(
            pipeline,
            strategy = self.grouper.name(),
            groups = grouping.len(),
            units = units.len(),
            "Generated pipeline"
        );

        Ok(CompiledGraph {
            schema_version: SCHEMA_VERSION.to_string(),
            pipeline_info: PipelineInfo {
                name: self.pipeline_name(),
                description: self.run_config.description.clone(),
            },
            run_name: self.run_name.clone(),
            units,
        })
    }

    /// Group name → unit name, rejecting empty and colliding names
    fn unit_names<'g>(
        &self,
        grouping: &'g Grouping,
        mlflow: bool,
    ) -> Result<BTreeMap<&'g str, String>, GeneratorError> {
        let mut owners: BTreeMap<String, &str> = BTreeMap::new();
        if mlflow {
            owners.insert(MLFLOW_UNIT.to_string(), MLFLOW_UNIT);
        }

        let mut names = BTreeMap::new();
        for group in grouping.nodes_mapping().keys() {
            let name = naming::clean_name(group);
            if name.is_empty() {
                return Err(GeneratorError::EmptyName {
                    group: group.clone(),
                });
            }
            if let Some(first) = owners.insert(name.clone(), group) {
                return Err(GeneratorError::NameCollision {
                    unit: name,
                    first: first.to_string(),
                    second: group.clone(),
                });
            }
            names.insert(group.as_str(), name);
        }

        Ok(names)
    }

    fn mlflow_unit(&self, commands: &CommandBuilder<'_>, image: &str, token: &str) -> GeneratedUnit {
        GeneratedUnit {
            name: MLFLOW_UNIT.to_string(),
            group: None,
            nodes: Vec::new(),
            image: image.to_string(),
            image_pull_policy: self.run_config.image_pull_policy.clone(),
            command: shell(),
            args: vec![commands.mlflow_command(&self.run_name)],
            inputs: BTreeMap::from([("mlflow_tracking_token".to_string(), token.to_string())]),
            outputs: vec!["output".to_string()],
            dependencies: BTreeSet::new(),
            resources: None,
            node_selector: BTreeMap::new(),
        }
    }
}

fn shell() -> Vec<String> {
    vec!["/bin/bash".to_string(), "-c".to_string()]
}
