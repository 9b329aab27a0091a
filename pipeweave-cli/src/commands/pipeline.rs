//! Pipeline command handlers
//!
//! Handles compiling, running, scheduling and listing pipelines.

use anyhow::{Context, Result};
use colored::*;
use pipeweave_core::domain::job::{Job, PipelineState};
use pipeweave_core::generator::{CompiledGraph, GeneratedUnit};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;

/// Delay between job status checks when waiting
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// List all jobs
pub async fn list_pipelines(config: &Config) -> Result<()> {
    let client = config.pipelines_client()?;
    let jobs = client.list_pipelines().await?;

    if jobs.is_empty() {
        println!("{}", "No pipeline runs found.".yellow());
    } else {
        println!("{}", format!("Found {} pipeline run(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

/// Compile a pipeline into a JSON file
pub async fn compile(config: &Config, image: Option<String>, pipeline: &str, output: &Path) -> Result<()> {
    let client = config.pipelines_client()?;
    let image = image.unwrap_or_else(|| client.config().run_config.image.clone());

    let graph = client
        .compile(pipeline, &image, output)
        .await
        .with_context(|| format!("Failed to compile pipeline '{}'", pipeline))?;

    println!("{}", "✓ Pipeline compiled successfully!".green().bold());
    println!("  Pipeline: {}", graph.pipeline_info.name.bold());
    println!("  Units:    {}", graph.units.len().to_string().cyan());
    println!("  Output:   {}", output.display().to_string().dimmed());

    Ok(())
}

/// Submit a single run, optionally waiting for it to finish
pub async fn run_once(
    config: &Config,
    image: Option<String>,
    pipeline: &str,
    parameters: HashMap<String, JsonValue>,
    wait: bool,
    timeout: u64,
) -> Result<()> {
    let client = config.pipelines_client()?;
    let image = image.unwrap_or_else(|| client.config().run_config.image.clone());

    let job = client.run_once(pipeline, &image, parameters).await?;

    println!("{}", "✓ Pipeline run submitted!".green().bold());
    println!("  Job ID:  {}", job.id.cyan());
    println!("  Name:    {}", job.display_name.bold());
    println!("  State:   {}", colorize_state(&job.state));

    if !wait {
        return Ok(());
    }

    println!();
    println!("{}", "Waiting for the run to finish...".dimmed());
    let result = client
        .orchestrator()
        .wait_for_completion(&job.id, POLL_INTERVAL, Duration::from_secs(timeout))
        .await?;

    println!("  State:   {}", colorize_state(&result.state));
    if let Some(message) = result.job.as_ref().and_then(|j| j.error_message.as_ref()) {
        println!("  Error:   {}", message.red());
    }

    if !result.is_success {
        anyhow::bail!("Pipeline run {} finished in state {:?}", job.id, result.state);
    }
    Ok(())
}

/// Schedule recurring runs
pub async fn schedule(
    config: &Config,
    pipeline: &str,
    cron_expression: &str,
    time_zone: &str,
    parameters: HashMap<String, JsonValue>,
) -> Result<()> {
    let client = config.pipelines_client()?;

    let schedule = client
        .schedule(pipeline, cron_expression, parameters, time_zone)
        .await?;

    println!("{}", "✓ Pipeline scheduled!".green().bold());
    println!("  Schedule ID: {}", schedule.id.cyan());
    println!("  Pipeline:    {}", schedule.pipeline_name.bold());
    println!("  Cron:        {} ({})", schedule.cron, schedule.time_zone.dimmed());

    Ok(())
}

/// Print the units of a pipeline in execution order
pub async fn describe(config: &Config, pipeline: &str) -> Result<()> {
    let client = config.pipelines_client()?;
    let graph = client
        .generate(pipeline, &client.config().run_config.image)
        .await?;

    print_graph(&graph);
    Ok(())
}

/// Print a job summary
fn print_job_summary(job: &Job) {
    println!("  {} {}", "▸".cyan(), job.display_name.bold());
    println!("    ID:      {}", job.id.dimmed());
    println!("    State:   {}", colorize_state(&job.state));
    println!(
        "    Created: {}",
        job.create_time
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

/// Print units level by level
fn print_graph(graph: &CompiledGraph) {
    println!("{}", format!("Pipeline {}", graph.pipeline_info.name).bold());
    if let Some(description) = &graph.pipeline_info.description {
        println!("  {}", description.dimmed());
    }
    println!();

    let Some(levels) = graph.execution_levels() else {
        println!("{}", "Graph contains a cycle".red());
        return;
    };

    for (index, level) in levels.iter().enumerate() {
        println!("{}", format!("Level {}:", index + 1).bold());
        for name in level {
            if let Some(unit) = graph.unit(name) {
                print_unit(unit);
            }
        }
    }
}

fn print_unit(unit: &GeneratedUnit) {
    println!("  {} {}", "▸".cyan(), unit.name.bold());
    if !unit.nodes.is_empty() {
        println!("    Nodes:     {}", unit.nodes.join(", "));
    }
    if !unit.dependencies.is_empty() {
        let deps: Vec<&str> = unit.dependencies.iter().map(String::as_str).collect();
        println!("    After:     {}", deps.join(", ").dimmed());
    }
    if let Some(resources) = &unit.resources {
        let mut parts = Vec::new();
        if let Some(cpu) = &resources.cpu_request {
            parts.push(format!("cpu={}", cpu));
        }
        if let Some(memory) = &resources.memory_request {
            parts.push(format!("memory={}", memory));
        }
        if let Some(accelerator) = &resources.accelerator {
            parts.push(format!(
                "gpu={}{}",
                accelerator.count,
                accelerator
                    .accelerator_type
                    .as_ref()
                    .map(|t| format!(" ({})", t))
                    .unwrap_or_default()
            ));
        }
        println!("    Resources: {}", parts.join(", ").dimmed());
    }
    if !unit.node_selector.is_empty() {
        let selectors: Vec<String> = unit
            .node_selector
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        println!("    Selectors: {}", selectors.join(", ").dimmed());
    }
}

/// Colorize pipeline state for display
fn colorize_state(state: &PipelineState) -> ColoredString {
    let label = format!("{:?}", state);
    match state {
        PipelineState::Succeeded => label.green(),
        PipelineState::Failed => label.red(),
        PipelineState::Cancelled | PipelineState::Cancelling => label.magenta(),
        PipelineState::Running => label.cyan(),
        _ => label.yellow(),
    }
}
