//! Pipelines facade
//!
//! Ties the generator to the orchestration API: compile a pipeline, submit it
//! once, or register it on a schedule.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use pipeweave_core::config::PluginConfig;
use pipeweave_core::domain::job::{Job, Schedule};
use pipeweave_core::dto::job::SubmitJob;
use pipeweave_core::dto::schedule::CreateSchedule;
use pipeweave_core::generator::{CompiledGraph, PipelineGenerator, UnitEnvironment};
use pipeweave_core::grouping::GrouperRegistry;
use pipeweave_core::source::PipelineSource;
use serde_json::Value;

use crate::OrchestratorClient;
use crate::auth::TokenProvider;
use crate::error::Result;

/// Run name for an experiment: trailing `-` removed, UTC timestamp appended
pub fn generate_run_name(experiment_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        experiment_name.trim_end_matches('-'),
        now.format("%Y%m%d%H%M%S")
    )
}

/// Compiles pipelines of one project and runs them on the orchestrator
pub struct PipelinesClient {
    orchestrator: OrchestratorClient,
    config: PluginConfig,
    generator: PipelineGenerator,
    source: Box<dyn PipelineSource>,
    tokens: Box<dyn TokenProvider>,
}

impl PipelinesClient {
    /// Build the facade, resolving the grouping strategy from configuration
    pub fn new(
        orchestrator: OrchestratorClient,
        config: PluginConfig,
        source: Box<dyn PipelineSource>,
        project_name: &str,
        env: &str,
        tokens: Box<dyn TokenProvider>,
    ) -> Result<Self> {
        Self::with_registry(
            orchestrator,
            config,
            source,
            project_name,
            env,
            tokens,
            &GrouperRegistry::with_builtins(),
        )
    }

    /// Like [`PipelinesClient::new`] with a custom strategy registry
    pub fn with_registry(
        orchestrator: OrchestratorClient,
        config: PluginConfig,
        source: Box<dyn PipelineSource>,
        project_name: &str,
        env: &str,
        tokens: Box<dyn TokenProvider>,
        registry: &GrouperRegistry,
    ) -> Result<Self> {
        let grouper = registry.build(&config.run_config.grouping)?;
        let run_name = generate_run_name(&config.run_config.experiment_name, Utc::now());
        let generator = PipelineGenerator::new(&config, project_name, env, run_name, grouper)?
            .with_params(source.params())
            .with_environment(UnitEnvironment::from_env());

        Ok(Self {
            orchestrator,
            config,
            generator,
            source,
            tokens,
        })
    }

    pub fn run_name(&self) -> &str {
        self.generator.run_name()
    }

    pub fn pipeline_name(&self) -> String {
        self.generator.pipeline_name()
    }

    pub fn source(&self) -> &dyn PipelineSource {
        self.source.as_ref()
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &OrchestratorClient {
        &self.orchestrator
    }

    /// Generate the compiled graph of `pipeline`
    pub async fn generate(&self, pipeline: &str, image: &str) -> Result<CompiledGraph> {
        let token = self.tokens.token().await?;
        Ok(self
            .generator
            .generate_pipeline(self.source.as_ref(), pipeline, image, &token)?)
    }

    /// Compile `pipeline` and write it to `output` as JSON
    pub async fn compile(&self, pipeline: &str, image: &str, output: &Path) -> Result<CompiledGraph> {
        let graph = self.generate(pipeline, image).await?;
        graph
            .write_to(output)
            .map_err(pipeweave_core::Error::from)?;

        tracing::info!(path = %output.display(), "Generated pipeline definition was saved");
        Ok(graph)
    }

    /// Compile `pipeline` and submit it as a single run
    pub async fn run_once(
        &self,
        pipeline: &str,
        image: &str,
        parameters: HashMap<String, Value>,
    ) -> Result<Job> {
        let spec = self.generate(pipeline, image).await?;
        let run_config = &self.config.run_config;

        let request = SubmitJob {
            job_id: self.run_name().to_string(),
            display_name: self.run_name().to_string(),
            pipeline_root: run_config.pipeline_root(),
            spec,
            parameter_values: parameters,
            enable_caching: false,
            service_account: run_config.service_account.clone(),
            network: run_config.network.vpc.clone(),
        };

        self.orchestrator.submit_job(&request).await
    }

    /// Register a recurring run of `pipeline`
    ///
    /// Existing schedules of the same pipeline are deleted once the new graph
    /// has been generated.
    pub async fn schedule(
        &self,
        pipeline: &str,
        cron_expression: &str,
        parameters: HashMap<String, Value>,
        time_zone: &str,
    ) -> Result<Schedule> {
        let run_config = &self.config.run_config;
        let spec = self.generate(pipeline, &run_config.image).await?;

        let pipeline_name = self.pipeline_name();
        self.cleanup_old_schedules(&pipeline_name).await?;

        let request = CreateSchedule {
            display_name: run_config
                .scheduled_run_name
                .clone()
                .unwrap_or_else(|| self.run_name().to_string()),
            cron: cron_expression.to_string(),
            time_zone: time_zone.to_string(),
            pipeline_root: run_config.pipeline_root(),
            spec,
            parameter_values: parameters,
            enable_caching: false,
            service_account: run_config.service_account.clone(),
        };

        let schedule = self.orchestrator.create_schedule(&request).await?;
        tracing::info!(cron = cron_expression, pipeline = %pipeline_name, "Pipeline scheduled");
        Ok(schedule)
    }

    /// All jobs known to the orchestrator
    pub async fn list_pipelines(&self) -> Result<Vec<Job>> {
        self.orchestrator.list_jobs().await
    }

    async fn cleanup_old_schedules(&self, pipeline_name: &str) -> Result<()> {
        for schedule in self.orchestrator.list_schedules().await? {
            if schedule.pipeline_name != pipeline_name {
                continue;
            }
            tracing::info!(
                schedule_id = %schedule.id,
                cron = %schedule.cron,
                "Found existing schedule for the pipeline, deleting"
            );
            self.orchestrator.delete_schedule(&schedule.id).await?;
        }
        Ok(())
    }
}
